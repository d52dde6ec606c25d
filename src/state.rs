//! Versioned workflow state.
//!
//! State is organized into three channels, each tracking a version counter so
//! the runtime can tell what changed in a step:
//!
//! - **messages**: the append-only conversation history
//! - **domain**: the workflow's typed domain record (`S`)
//! - **errors**: runtime error events
//!
//! Nodes never touch [`WorkflowState`] directly. They receive an immutable
//! [`StateSnapshot`], clone the domain record, modify the copy, and hand it
//! back in a partial update. The copy-on-write discipline is what keeps
//! concurrent sessions that share node instances from aliasing each other's
//! state.

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::ErrorEvent;
use crate::message::Message;

/// Bound alias for workflow domain records.
///
/// A domain record is a plain serde-able value with a meaningful
/// [`Default`] (the "nothing has happened yet" state).
pub trait Domain:
    Clone + std::fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> Domain for T where
    T: Clone + std::fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// A value paired with a monotonically increasing version counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedChannel<T> {
    value: T,
    version: u32,
}

impl<T> VersionedChannel<T> {
    pub fn new(value: T, version: u32) -> Self {
        Self { value, version }
    }

    /// Read-only access to the current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Mutable access; callers bump the version via [`bump`](Self::bump)
    /// after a meaningful change.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn bump(&mut self) {
        self.version = self.version.saturating_add(1);
    }
}

impl<T: Default> Default for VersionedChannel<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            version: 1,
        }
    }
}

/// The complete state of one workflow session.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowState<S> {
    /// Conversation history (append-only).
    pub messages: VersionedChannel<Vec<Message>>,
    /// The workflow's typed domain record.
    pub domain: VersionedChannel<S>,
    /// Runtime error events.
    pub errors: VersionedChannel<Vec<ErrorEvent>>,
}

impl<S: Domain> Default for WorkflowState<S> {
    fn default() -> Self {
        Self {
            messages: VersionedChannel::default(),
            domain: VersionedChannel::default(),
            errors: VersionedChannel::default(),
        }
    }
}

impl<S: Domain> WorkflowState<S> {
    /// State seeded with a single user message and a default domain record.
    pub fn new_with_user_message(user_text: &str) -> Self {
        Self {
            messages: VersionedChannel::new(vec![Message::user(user_text)], 1),
            domain: VersionedChannel::default(),
            errors: VersionedChannel::default(),
        }
    }

    /// State seeded with an explicit domain record and optional opening turn.
    pub fn with_domain(domain: S) -> Self {
        Self {
            messages: VersionedChannel::default(),
            domain: VersionedChannel::new(domain, 1),
            errors: VersionedChannel::default(),
        }
    }

    /// Append a conversational turn.
    pub fn push_message(&mut self, message: Message) {
        self.messages.get_mut().push(message);
        self.messages.bump();
    }

    /// Immutable point-in-time view handed to nodes and routers.
    pub fn snapshot(&self) -> StateSnapshot<S> {
        StateSnapshot {
            messages: self.messages.get().clone(),
            messages_version: self.messages.version(),
            domain: self.domain.get().clone(),
            domain_version: self.domain.version(),
            errors: self.errors.get().clone(),
            errors_version: self.errors.version(),
        }
    }
}

/// Immutable snapshot of a session's state at a point in time.
///
/// Snapshots are independent clones: mutations of the live state after the
/// snapshot was taken are not visible through it.
#[derive(Clone, Debug)]
pub struct StateSnapshot<S> {
    pub messages: Vec<Message>,
    pub messages_version: u32,
    pub domain: S,
    pub domain_version: u32,
    pub errors: Vec<ErrorEvent>,
    pub errors_version: u32,
}

impl<S> StateSnapshot<S> {
    /// The most recent user turn, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.has_role(Message::USER))
    }
}

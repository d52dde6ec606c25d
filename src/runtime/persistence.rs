//! Serde-friendly persisted shapes for checkpoints.
//!
//! These types decouple the stored representation from the in-memory state so
//! the checkpointer code stays lean and declarative. This module does no I/O;
//! it is pure data transformation.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorEvent;
use crate::message::Message;
use crate::state::{Domain, VersionedChannel, WorkflowState};

use super::checkpointer::{Checkpoint, CheckpointerError};

/// A vector channel with its version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedVecChannel<T> {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<T>,
}

/// The typed domain channel with its version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedDomainChannel<S> {
    pub version: u32,
    pub record: S,
}

/// Complete persisted shape of a [`WorkflowState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedState<S> {
    pub messages: PersistedVecChannel<Message>,
    pub domain: PersistedDomainChannel<S>,
    #[serde(default = "empty_errors")]
    pub errors: PersistedVecChannel<ErrorEvent>,
}

fn empty_errors() -> PersistedVecChannel<ErrorEvent> {
    PersistedVecChannel {
        version: 1,
        items: Vec::new(),
    }
}

/// Full persisted checkpoint row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint<S> {
    pub session_id: String,
    pub step: u64,
    pub state: PersistedState<S>,
    /// Cursor in [`NodeKind::encode`](crate::types::NodeKind::encode) form.
    pub cursor: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl<S: Domain> From<&WorkflowState<S>> for PersistedState<S> {
    fn from(s: &WorkflowState<S>) -> Self {
        PersistedState {
            messages: PersistedVecChannel {
                version: s.messages.version(),
                items: s.messages.get().clone(),
            },
            domain: PersistedDomainChannel {
                version: s.domain.version(),
                record: s.domain.get().clone(),
            },
            errors: PersistedVecChannel {
                version: s.errors.version(),
                items: s.errors.get().clone(),
            },
        }
    }
}

impl<S: Domain> From<PersistedState<S>> for WorkflowState<S> {
    fn from(p: PersistedState<S>) -> Self {
        WorkflowState {
            messages: VersionedChannel::new(p.messages.items, p.messages.version),
            domain: VersionedChannel::new(p.domain.record, p.domain.version),
            errors: VersionedChannel::new(p.errors.items, p.errors.version),
        }
    }
}

impl<S: Domain> From<&Checkpoint<S>> for PersistedCheckpoint<S> {
    fn from(cp: &Checkpoint<S>) -> Self {
        PersistedCheckpoint {
            session_id: cp.session_id.clone(),
            step: cp.step,
            state: PersistedState::from(&cp.state),
            cursor: cp.cursor.encode(),
            created_at: cp.created_at.to_rfc3339(),
        }
    }
}

impl<S: Domain> From<PersistedCheckpoint<S>> for Checkpoint<S> {
    fn from(p: PersistedCheckpoint<S>) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now());
        Checkpoint {
            session_id: p.session_id,
            step: p.step,
            state: WorkflowState::from(p.state),
            cursor: crate::types::NodeKind::decode(&p.cursor),
            created_at,
        }
    }
}

/// Serialize a persisted model to JSON, mapping failures to the
/// checkpointer's error type.
pub fn to_json<T: Serialize>(value: &T, what: &'static str) -> Result<String, CheckpointerError> {
    serde_json::to_string(value).map_err(|e| CheckpointerError::Serde {
        message: format!("{what}: {e}"),
    })
}

/// Deserialize a persisted model from JSON.
pub fn from_json<T: serde::de::DeserializeOwned>(
    json: &str,
    what: &'static str,
) -> Result<T, CheckpointerError> {
    serde_json::from_str(json).map_err(|e| CheckpointerError::Serde {
        message: format!("{what}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Probe {
        tag: String,
    }

    #[test]
    fn state_roundtrips_through_persisted_shape() {
        let mut state: WorkflowState<Probe> = WorkflowState::new_with_user_message("hello");
        state.domain.get_mut().tag = "t".into();
        state.domain.bump();

        let persisted = PersistedState::from(&state);
        let restored = WorkflowState::from(persisted);
        assert_eq!(restored, state);
    }

    #[test]
    fn checkpoint_roundtrips_through_json() {
        let state: WorkflowState<Probe> = WorkflowState::new_with_user_message("hello");
        let cp = Checkpoint::new("s", 2, state, NodeKind::Custom("explainer".into()));
        let json = to_json(&PersistedCheckpoint::from(&cp), "checkpoint").unwrap();
        let back: PersistedCheckpoint<Probe> = from_json(&json, "checkpoint").unwrap();
        let restored = Checkpoint::from(back);
        assert_eq!(restored.step, 2);
        assert_eq!(restored.cursor, NodeKind::Custom("explainer".into()));
        assert_eq!(restored.state, cp.state);
    }
}

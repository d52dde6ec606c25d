//! Node execution primitives.
//!
//! A [`Node`] is one stage of a workflow: an async function from the current
//! state snapshot to a partial update. Nodes are expected to catch the errors
//! of their own external calls and fold them into the domain record
//! (status/error fields); returning `Err` is reserved for genuinely broken
//! invariants and aborts the invocation.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::errors::ErrorEvent;
use crate::message::Message;
use crate::state::{Domain, StateSnapshot};

/// One executable stage of a workflow.
///
/// Implementations must be stateless with respect to session data: every
/// per-session fact lives in the snapshot, so a single node instance can be
/// shared across concurrent sessions.
#[async_trait]
pub trait Node<S: Domain>: Send + Sync {
    async fn run(
        &self,
        snapshot: StateSnapshot<S>,
        ctx: NodeContext,
    ) -> Result<NodePartial<S>, NodeError>;
}

/// Execution context handed to a node.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Identifier of the executing node within the graph.
    pub node_id: String,
    /// Step number of this execution within the session.
    pub step: u64,
    /// Session identifier, for log correlation.
    pub session_id: String,
}

impl NodeContext {
    /// Emit a node-scoped progress event to the log stream.
    pub fn emit(&self, scope: &str, message: impl AsRef<str>) {
        tracing::debug!(
            node = %self.node_id,
            step = self.step,
            session = %self.session_id,
            scope,
            "{}",
            message.as_ref()
        );
    }
}

/// Partial state update returned by a node.
///
/// All fields are optional so a node touches only the channels it cares
/// about. `domain` replaces the record wholesale: nodes clone the snapshot's
/// record, modify the copy, and return it.
#[derive(Clone, Debug)]
pub struct NodePartial<S> {
    /// Messages to append to the conversation history.
    pub messages: Option<Vec<Message>>,
    /// Replacement domain record.
    pub domain: Option<S>,
    /// Error events to append.
    pub errors: Option<Vec<ErrorEvent>>,
}

impl<S> Default for NodePartial<S> {
    fn default() -> Self {
        Self {
            messages: None,
            domain: None,
            errors: None,
        }
    }
}

impl<S> NodePartial<S> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: S) -> Self {
        self.domain = Some(domain);
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Fatal node-execution errors.
///
/// These abort the invocation. Recoverable failures belong in the domain
/// record, not here.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// An invariant the graph should have guaranteed does not hold.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(civicflow::node::missing_input),
        help("Check that the routing into this node guarantees the input exists.")
    )]
    MissingInput { what: &'static str },

    /// An external collaborator failed in a way the node cannot fold into state.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(civicflow::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON (de)serialization failure inside a node.
    #[error(transparent)]
    #[diagnostic(code(civicflow::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed in a non-recoverable way.
    #[error("validation failed: {0}")]
    #[diagnostic(code(civicflow::node::validation))]
    ValidationFailed(String),
}

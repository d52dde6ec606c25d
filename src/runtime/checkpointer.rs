//! Durable session-keyed state storage.
//!
//! A [`Checkpoint`] captures everything needed to resume a session: the full
//! workflow state, the step counter, and the cursor: the node the engine
//! will execute next. The runner writes one checkpoint after every node
//! execution, so the latest checkpoint is always the last completed node's
//! output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::state::{Domain, WorkflowState};
use crate::types::NodeKind;

/// Which checkpointer backend a runner should construct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointerType {
    InMemory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// One persisted step of a session.
#[derive(Clone, Debug)]
pub struct Checkpoint<S> {
    pub session_id: String,
    /// Number of node executions completed so far.
    pub step: u64,
    pub state: WorkflowState<S>,
    /// The node the engine will run next; `End` when the invocation completed.
    pub cursor: NodeKind,
    pub created_at: DateTime<Utc>,
}

impl<S: Domain> Checkpoint<S> {
    pub fn new(session_id: &str, step: u64, state: WorkflowState<S>, cursor: NodeKind) -> Self {
        Self {
            session_id: session_id.to_string(),
            step,
            state,
            cursor,
            created_at: Utc::now(),
        }
    }
}

/// Errors surfaced by checkpoint storage.
///
/// Checkpoint failures are invocation-fatal: workflow correctness depends on
/// durable state, so they propagate instead of degrading.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    /// Storage backend failure (connection, pool exhaustion, I/O). Retryable.
    #[error("checkpoint backend error: {message}")]
    #[diagnostic(
        code(civicflow::checkpointer::backend),
        help("Backend errors are usually transient; retry the invocation.")
    )]
    Backend { message: String },

    /// Serialization failure converting state to/from its persisted shape.
    #[error("checkpoint serialization error: {message}")]
    #[diagnostic(code(civicflow::checkpointer::serde))]
    Serde { message: String },
}

pub type Result<T> = std::result::Result<T, CheckpointerError>;

/// Durable mapping from session identifier to the latest workflow state.
#[async_trait]
pub trait Checkpointer<S: Domain>: Send + Sync {
    /// Persist a checkpoint (`put`). Within a session, calls are strictly
    /// ordered by the runner.
    async fn save(&self, checkpoint: Checkpoint<S>) -> Result<()>;

    /// Load the latest checkpoint for a session (`get`), or `None` for a
    /// session that has never been persisted.
    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint<S>>>;

    /// All known session identifiers.
    async fn list_sessions(&self) -> Result<Vec<String>>;

    /// Release backend resources. Default: no-op.
    async fn close(&self) {}
}

/// Volatile checkpointer for tests and development.
///
/// Keeps only the latest checkpoint per session, which is all the runner's
/// resume path needs.
pub struct InMemoryCheckpointer<S> {
    store: Mutex<FxHashMap<String, Checkpoint<S>>>,
}

impl<S> InMemoryCheckpointer<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<S> Default for InMemoryCheckpointer<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: Domain> Checkpointer<S> for InMemoryCheckpointer<S> {
    async fn save(&self, checkpoint: Checkpoint<S>) -> Result<()> {
        self.store
            .lock()
            .insert(checkpoint.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint<S>>> {
        Ok(self.store.lock().get(session_id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self.store.lock().keys().cloned().collect())
    }
}

//! Session execution engine.
//!
//! [`AppRunner`] drives a compiled [`App`] one node per step:
//!
//! 1. run the cursor node against a snapshot of the working state,
//! 2. merge its partial update,
//! 3. evaluate the route out of the node (conditional edge first, otherwise
//!    the unconditional edge),
//! 4. persist a checkpoint carrying the merged state and the *next* cursor,
//! 5. advance, until the cursor reaches `End`.
//!
//! Because the checkpoint is written before advancing, a process crash leaves
//! the session resumable from the last completed node's output rather than
//! from the graph entry.
//!
//! Invocations for the same session id are serialized behind a per-session
//! async mutex held for the whole invocation and released only after the
//! final checkpoint write; distinct sessions run fully concurrently.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::app::App;
use crate::errors::ErrorEvent;
use crate::node::NodeContext;
use crate::reducers::apply_partial;
use crate::state::{Domain, WorkflowState};
use crate::types::NodeKind;

use super::checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
};
use super::config::RuntimeConfig;

/// In-memory execution state of one session.
#[derive(Clone, Debug)]
pub struct SessionState<S> {
    pub state: WorkflowState<S>,
    /// Node executions completed so far.
    pub step: u64,
    /// The node the engine will run next; `End` between invocations.
    pub cursor: NodeKind,
}

/// How a session came into being.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInit {
    Fresh,
    Resumed { checkpoint_step: u64 },
}

/// Errors raised by the runner.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(civicflow::runner::session_not_found))]
    SessionNotFound { session_id: String },

    #[error("no route out of Start; the graph has no entry")]
    #[diagnostic(code(civicflow::runner::no_entry))]
    NoEntry,

    #[error("route target `{target}` is not a registered node")]
    #[diagnostic(
        code(civicflow::runner::unknown_route_target),
        help("A conditional edge returned a node that was never registered; routers must be total.")
    )]
    UnknownRouteTarget { target: String },

    #[error("node `{node}` has no route forward")]
    #[diagnostic(code(civicflow::runner::missing_route))]
    MissingRoute { node: String },

    #[error("node `{node}` failed at step {step}: {message}")]
    #[diagnostic(
        code(civicflow::runner::node_run),
        help("The failing state was persisted with a synthetic error marker; inspect the session's error channel.")
    )]
    NodeRun {
        node: String,
        step: u64,
        message: String,
    },

    #[error(transparent)]
    #[diagnostic(code(civicflow::runner::checkpointer))]
    Checkpointer(#[from] CheckpointerError),
}

/// Runtime execution environment for a compiled graph.
pub struct AppRunner<S> {
    app: Arc<App<S>>,
    checkpointer: Arc<dyn Checkpointer<S>>,
    sessions: Mutex<FxHashMap<String, SessionState<S>>>,
    locks: Mutex<FxHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    autosave: bool,
}

impl<S: Domain> AppRunner<S> {
    /// Create a runner with an explicit checkpointer.
    pub fn new(app: App<S>, checkpointer: Arc<dyn Checkpointer<S>>) -> Self {
        Self::from_arc(Arc::new(app), checkpointer)
    }

    pub fn from_arc(app: Arc<App<S>>, checkpointer: Arc<dyn Checkpointer<S>>) -> Self {
        Self {
            app,
            checkpointer,
            sessions: Mutex::new(FxHashMap::default()),
            locks: Mutex::new(FxHashMap::default()),
            autosave: true,
        }
    }

    /// Construct the checkpointer named by the app's runtime config.
    pub async fn for_config(app: App<S>) -> Result<Self, RunnerError> {
        let config = app.runtime_config().clone();
        let checkpointer = Self::build_checkpointer(&config).await?;
        Ok(Self::new(app, checkpointer))
    }

    async fn build_checkpointer(
        config: &RuntimeConfig,
    ) -> Result<Arc<dyn Checkpointer<S>>, RunnerError> {
        match config.checkpointer.clone().unwrap_or(CheckpointerType::InMemory) {
            CheckpointerType::InMemory => Ok(Arc::new(InMemoryCheckpointer::new())),
            #[cfg(feature = "sqlite")]
            CheckpointerType::Sqlite => {
                let db_url = std::env::var("CIVICFLOW_SQLITE_URL")
                    .ok()
                    .or_else(|| {
                        config
                            .sqlite_db_name
                            .as_ref()
                            .map(|name| format!("sqlite://{name}"))
                    })
                    .unwrap_or_else(|| "sqlite://civicflow.db".to_string());
                let cp = super::checkpointer_sqlite::SqliteCheckpointer::connect(&db_url).await?;
                Ok(Arc::new(cp))
            }
        }
    }

    fn lock_for(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Initialize a session, resuming from the latest checkpoint when one
    /// exists.
    #[instrument(skip(self, initial_state), err)]
    pub async fn create_session(
        &self,
        session_id: &str,
        initial_state: WorkflowState<S>,
    ) -> Result<SessionInit, RunnerError> {
        if let Some(stored) = self.checkpointer.load_latest(session_id).await? {
            let init = SessionInit::Resumed {
                checkpoint_step: stored.step,
            };
            self.sessions.lock().insert(
                session_id.to_string(),
                SessionState {
                    state: stored.state,
                    step: stored.step,
                    cursor: stored.cursor,
                },
            );
            return Ok(init);
        }

        let session = SessionState {
            state: initial_state,
            step: 0,
            cursor: NodeKind::Start,
        };
        if self.autosave {
            self.checkpointer
                .save(Checkpoint::new(
                    session_id,
                    session.step,
                    session.state.clone(),
                    session.cursor.clone(),
                ))
                .await?;
        }
        self.sessions
            .lock()
            .insert(session_id.to_string(), session);
        Ok(SessionInit::Fresh)
    }

    /// Mutate a session's working state before an invocation (e.g. append the
    /// new user turn). The change is picked up by the next checkpoint write.
    pub fn update_session<F>(&self, session_id: &str, mutate: F) -> Result<(), RunnerError>
    where
        F: FnOnce(&mut WorkflowState<S>),
    {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| RunnerError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        mutate(&mut session.state);
        Ok(())
    }

    /// Run the session until routing reaches `End`.
    ///
    /// Re-entry: a session whose cursor is `Start` (fresh) or `End` (previous
    /// invocation completed) enters through the graph's `Start` routing; a
    /// session with an executable cursor resumes exactly there.
    #[instrument(skip(self), err)]
    pub async fn run_until_complete(
        &self,
        session_id: &str,
    ) -> Result<WorkflowState<S>, RunnerError> {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        self.run_locked(session_id).await
    }

    /// Convenience: initialize (or resume) a session, apply a preparation
    /// closure, and run to completion, all under the per-session lock.
    #[instrument(skip(self, initial_state, prepare), err)]
    pub async fn invoke_with<F>(
        &self,
        session_id: &str,
        initial_state: WorkflowState<S>,
        prepare: F,
    ) -> Result<WorkflowState<S>, RunnerError>
    where
        F: FnOnce(&mut WorkflowState<S>) + Send,
    {
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().await;
        self.create_session(session_id, initial_state).await?;
        self.update_session(session_id, prepare)?;
        self.run_locked(session_id).await
    }

    async fn run_locked(&self, session_id: &str) -> Result<WorkflowState<S>, RunnerError> {
        let (mut state, mut step, mut cursor) = {
            let sessions = self.sessions.lock();
            let session =
                sessions
                    .get(session_id)
                    .ok_or_else(|| RunnerError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;
            (
                session.state.clone(),
                session.step,
                session.cursor.clone(),
            )
        };

        if cursor.is_start() || cursor.is_end() {
            cursor = self
                .app
                .entry_for(&state.snapshot())
                .ok_or(RunnerError::NoEntry)?;
        }

        tracing::info!(session = %session_id, cursor = %cursor, "workflow run started");

        while !cursor.is_end() {
            let node = self.app.nodes().get(&cursor).cloned().ok_or_else(|| {
                RunnerError::UnknownRouteTarget {
                    target: cursor.to_string(),
                }
            })?;

            step += 1;
            let ctx = NodeContext {
                node_id: cursor.encode(),
                step,
                session_id: session_id.to_string(),
            };

            let partial = match node.run(state.snapshot(), ctx).await {
                Ok(partial) => partial,
                Err(e) => {
                    // Invocation-fatal: record a synthetic marker, persist what
                    // we have, and surface the failure.
                    let event = ErrorEvent::node(cursor.encode(), step, e.to_string())
                        .with_context(serde_json::json!({ "session": session_id }));
                    state.errors.get_mut().push(event);
                    state.errors.bump();
                    self.store_session(session_id, &state, step, &cursor).await?;
                    return Err(RunnerError::NodeRun {
                        node: cursor.to_string(),
                        step,
                        message: e.to_string(),
                    });
                }
            };

            let outcome = apply_partial(&mut state, partial);
            tracing::debug!(
                session = %session_id,
                step,
                node = %cursor,
                updated = ?outcome.updated_channels(),
                "node applied"
            );

            let next = self
                .app
                .route_from(&cursor, &state.snapshot())
                .ok_or_else(|| RunnerError::MissingRoute {
                    node: cursor.to_string(),
                })?;
            if !next.is_end() && !self.app.nodes().contains_key(&next) {
                return Err(RunnerError::UnknownRouteTarget {
                    target: next.to_string(),
                });
            }

            // Checkpoint after every node, before advancing.
            self.store_session(session_id, &state, step, &next).await?;
            cursor = next;
        }

        tracing::info!(session = %session_id, step, "workflow run completed");
        Ok(state)
    }

    async fn store_session(
        &self,
        session_id: &str,
        state: &WorkflowState<S>,
        step: u64,
        cursor: &NodeKind,
    ) -> Result<(), RunnerError> {
        if self.autosave {
            self.checkpointer
                .save(Checkpoint::new(
                    session_id,
                    step,
                    state.clone(),
                    cursor.clone(),
                ))
                .await?;
        }
        self.sessions.lock().insert(
            session_id.to_string(),
            SessionState {
                state: state.clone(),
                step,
                cursor: cursor.clone(),
            },
        );
        Ok(())
    }

    /// Latest known state for a session: the in-memory working copy if the
    /// session is live in this runner, otherwise the latest checkpoint.
    pub async fn get_state(&self, session_id: &str) -> Result<Option<WorkflowState<S>>, RunnerError> {
        if let Some(session) = self.sessions.lock().get(session_id) {
            return Ok(Some(session.state.clone()));
        }
        Ok(self
            .checkpointer
            .load_latest(session_id)
            .await?
            .map(|cp| cp.state))
    }

    /// Session ids currently live in this runner.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }
}

impl<S: Domain> App<S> {
    /// One-shot convenience: build a runner from the app's runtime config and
    /// run `initial_state` under the configured session id.
    pub async fn invoke(self, initial_state: WorkflowState<S>) -> Result<WorkflowState<S>, RunnerError> {
        let session_id = self
            .runtime_config()
            .session_id
            .clone()
            .unwrap_or_else(|| format!("run-{}", uuid::Uuid::new_v4()));
        let runner = AppRunner::for_config(self).await?;
        runner.invoke_with(&session_id, initial_state, |_| {}).await
    }
}

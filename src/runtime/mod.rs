//! Workflow runtime: session execution, checkpointing, configuration.
//!
//! The runtime layer drives a compiled [`App`](crate::app::App):
//!
//! - [`AppRunner`] walks the graph one node per step, merging each node's
//!   partial update and persisting a checkpoint **before** advancing, so an
//!   interrupted session resumes from the last completed node's output.
//! - [`Checkpointer`] abstracts durable session storage;
//!   [`InMemoryCheckpointer`] serves tests and development,
//!   [`SqliteCheckpointer`] (feature `sqlite`) provides durable storage with
//!   full step history.
//! - Invocations for the same session id are serialized behind a per-session
//!   mutex; distinct sessions run fully concurrently.

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod config;
pub mod persistence;
pub mod runner;

pub use checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SqliteCheckpointer;
pub use config::RuntimeConfig;
pub use persistence::{PersistedCheckpoint, PersistedState};
pub use runner::{AppRunner, RunnerError, SessionInit, SessionState};

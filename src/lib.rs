//! # civicflow: conversational workflows over legislative bills
//!
//! civicflow is the workflow engine behind a conversational application that
//! discusses legislative bills and, on request, drafts and posts social-media
//! messages on a user's behalf. The heart of the crate is a graph engine: a
//! directed graph of language-model-backed processing nodes connected by
//! conditional routing, with durable per-session state and
//! at-most-one-concurrent-invocation-per-session semantics.
//!
//! ## Core concepts
//!
//! - **Nodes** ([`node::Node`]): async stages mapping a state snapshot to a
//!   partial update; each node folds its own failures into the state.
//! - **State** ([`state::WorkflowState`]): versioned channels: an
//!   append-only message history, a typed domain record per workflow, and
//!   runtime error events.
//! - **Graph** ([`graph::GraphBuilder`]): declarative topology with
//!   unconditional and conditional edges, validated at compile time.
//! - **Runtime** ([`runtime::AppRunner`]): sequential execution with a
//!   checkpoint written after every node, per-session locking, and resumable
//!   sessions backed by [`runtime::Checkpointer`] implementations.
//! - **Extraction** ([`extract::Extractor`]): language-model calls forced to
//!   a single schema-validated tool call, decoded into native sum types.
//! - **Workflows** ([`workflows`]): the three compiled graphs: bill
//!   analysis, quick analysis, and Twitter engagement.
//!
//! ## A minimal graph
//!
//! ```ignore
//! use civicflow::graph::GraphBuilder;
//! use civicflow::types::NodeKind;
//!
//! let app = GraphBuilder::new()
//!     .add_node("screen", screen_node)
//!     .add_edge(NodeKind::Start, "screen")
//!     .add_edge("screen", NodeKind::End)
//!     .compile()?;
//! let final_state = app.invoke(initial_state).await?;
//! ```

pub mod app;
pub mod errors;
pub mod extract;
pub mod graph;
pub mod message;
pub mod node;
pub mod reducers;
pub mod retrieval;
pub mod runtime;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod workflows;

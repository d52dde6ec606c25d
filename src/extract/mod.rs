//! Structured extraction: schema-constrained language-model calls.
//!
//! A single extraction is: build prompt turns, force the model to answer with
//! exactly one tool call, check the tool-call envelope, validate the payload
//! against the declared [`ToolSchema`], and decode into a native Rust type.
//! Validation is a boundary-only concern: once a value decodes, downstream
//! code works with ordinary sum types and never re-checks shapes.
//!
//! There is no retry at this layer; re-prompting and clarification loops are
//! node- and router-level decisions.

pub mod extractor;
pub mod schema;

pub use extractor::{ExtractError, Extractor};
pub use schema::{FieldKind, FieldSpec, ToolSchema, ToolSpec};

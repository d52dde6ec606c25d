//! The extraction tool: one forced tool call, validated and decoded.

use std::sync::Arc;

use miette::Diagnostic;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::message::Message;
use crate::services::{CompletionService, UpstreamError};

use super::schema::ToolSpec;

/// Extraction failures, both caught and folded into state by the calling
/// node agent.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    /// The payload failed schema validation; carries every violated field.
    #[error("extraction output failed validation: {}", violations.join("; "))]
    #[diagnostic(
        code(civicflow::extract::validation),
        help("Recoverable: re-prompt the user or fall back to a clarification state.")
    )]
    Validation { violations: Vec<String> },

    /// The completion service failed or produced a malformed tool-call
    /// envelope.
    #[error(transparent)]
    #[diagnostic(code(civicflow::extract::upstream))]
    Upstream(#[from] UpstreamError),
}

/// Schema-constrained extraction over an injected completion service.
///
/// Stateless and cheap to clone; one instance is shared by every node agent
/// that performs classification.
#[derive(Clone)]
pub struct Extractor {
    completion: Arc<dyn CompletionService>,
}

impl Extractor {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Issue exactly one forced tool call and decode the payload as `T`.
    ///
    /// Failure modes:
    /// - wrong tool name or absent payload → [`ExtractError::Upstream`] with
    ///   `"invalid tool response format"`
    /// - schema violations → [`ExtractError::Validation`] listing each field
    ///
    /// No retries happen here.
    pub async fn extract<T: DeserializeOwned>(
        &self,
        preamble: &str,
        turns: &[Message],
        tool: &ToolSpec,
    ) -> Result<T, ExtractError> {
        let call = self.completion.complete_tool(preamble, turns, tool).await?;

        if call.name != tool.name || call.arguments.is_null() {
            return Err(ExtractError::Upstream(UpstreamError::msg(
                "invalid tool response format",
            )));
        }

        tool.schema
            .validate(&call.arguments)
            .map_err(|violations| ExtractError::Validation { violations })?;

        // Post-validation decode; a mismatch here means the schema and the
        // target type disagree, which is a programming error we still refuse
        // to panic over.
        serde_json::from_value(call.arguments).map_err(|e| ExtractError::Validation {
            violations: vec![format!("$: {e}")],
        })
    }
}

//! Collaborator interfaces.
//!
//! Everything outside the engine (language-model completion, document
//! retrieval, reranking, embeddings, social posting) is consumed through the
//! narrow traits here. Node agents receive trait objects at construction time
//! (dependency injection; there is no ambient global client), which is also
//! what makes the workflows testable with canned fakes.

pub mod http;
pub mod similarity;

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::message::Message;
use crate::extract::ToolSpec;

/// A collaborator returned an unusable response.
///
/// Recoverable at the node level: fold into the domain record's status/error
/// fields, never propagate as a crash.
#[derive(Debug, Error, Diagnostic)]
#[error("upstream error: {message}")]
#[diagnostic(code(civicflow::services::upstream))]
pub struct UpstreamError {
    pub message: String,
}

impl UpstreamError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Document retrieval failed.
///
/// Cost-estimate fetches degrade to an empty-result sentinel; main-bill
/// fetches treat this as fatal for the node.
#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("fetch of {url} returned status {status}")]
    #[diagnostic(code(civicflow::services::fetch_status))]
    Status { url: String, status: u16 },

    #[error("fetch of {url} failed: {message}")]
    #[diagnostic(code(civicflow::services::fetch_transport))]
    Transport { url: String, message: String },

    #[error("invalid document url: {url}")]
    #[diagnostic(code(civicflow::services::fetch_url))]
    InvalidUrl { url: String },
}

/// Social-media post failed.
///
/// Recoverable: the engagement workflow surfaces a retry status and lets the
/// user try again.
#[derive(Debug, Error, Diagnostic)]
#[error("posting failed: {reason}")]
#[diagnostic(code(civicflow::services::posting))]
pub struct PostingError {
    pub reason: String,
}

/// The single tool call a forced completion must produce.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// Language-model completion service.
///
/// Two modes: free text for user-facing prose (summaries, tweet drafts) and a
/// forced single tool call for structured extraction.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Plain text completion over the given turns.
    async fn complete_text(
        &self,
        preamble: &str,
        turns: &[Message],
    ) -> Result<String, UpstreamError>;

    /// Completion constrained to exactly one call of `tool`.
    ///
    /// Implementations return the raw tool-call envelope; envelope and schema
    /// validation happen in the [`Extractor`](crate::extract::Extractor).
    async fn complete_tool(
        &self,
        preamble: &str,
        turns: &[Message],
        tool: &ToolSpec,
    ) -> Result<ToolCall, UpstreamError>;
}

/// Document fetch service: url in, extracted text out.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// One reranked candidate, referring back into the input by index.
#[derive(Clone, Debug, PartialEq)]
pub struct RankedCandidate {
    pub index: usize,
    pub relevance_score: f32,
}

/// Reranking service: orders candidates by relevance to a query, descending.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>, UpstreamError>;
}

/// Embedding service.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UpstreamError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}

/// A successfully published post.
#[derive(Clone, Debug, PartialEq)]
pub struct PostedTweet {
    pub id: String,
    pub text: String,
    pub url: String,
}

/// Social posting service.
#[async_trait]
pub trait SocialPoster: Send + Sync {
    async fn post(&self, text: &str) -> Result<PostedTweet, PostingError>;
}

//! HTTP-backed collaborator implementations.
//!
//! The completion client speaks the OpenAI-compatible `/chat/completions`
//! shape (most hosted and local gateways accept it); the rerank and embedding
//! clients speak the equally common `/rerank` and `/embeddings` shapes. All
//! clients carry request timeouts and map failures into the service error
//! taxonomy instead of panicking.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::{Value, json};
use std::time::Duration;

use crate::extract::ToolSpec;
use crate::message::Message;

use super::{
    CompletionService, DocumentFetcher, Embedder, FetchError, PostedTweet, PostingError,
    RankedCandidate, Reranker, SocialPoster, ToolCall, UpstreamError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Completion endpoint configuration, resolved explicitly and injected at
/// composition time.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl LlmConfig {
    /// Read from the environment (`LLM_BASE_URL`, `LLM_API_KEY`, `LLM_MODEL`,
    /// `LLM_TEMPERATURE`); a `.env` file is honored.
    pub fn from_env() -> Result<Self, UpstreamError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| UpstreamError::msg("LLM_API_KEY must be set"))?;
        let base_url = std::env::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let temperature = std::env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0.2);
        Ok(Self {
            base_url,
            api_key,
            model,
            temperature,
        })
    }
}

fn turns_to_wire(preamble: &str, turns: &[Message]) -> Vec<Value> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    if !preamble.is_empty() {
        messages.push(json!({"role": "system", "content": preamble}));
    }
    for turn in turns {
        messages.push(json!({"role": turn.role, "content": turn.content}));
    }
    messages
}

/// OpenAI-compatible chat-completion client.
pub struct HttpCompletionService {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpCompletionService {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    async fn send(&self, body: Value) -> Result<Value, UpstreamError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::msg(format!("completion request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::msg(format!(
                "completion service returned {status}: {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::msg(format!("completion response not json: {e}")))
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete_text(
        &self,
        preamble: &str,
        turns: &[Message],
    ) -> Result<String, UpstreamError> {
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": turns_to_wire(preamble, turns),
        });
        let response = self.send(body).await?;
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| UpstreamError::msg("completion response had no text content"))
    }

    async fn complete_tool(
        &self,
        preamble: &str,
        turns: &[Message],
        tool: &ToolSpec,
    ) -> Result<ToolCall, UpstreamError> {
        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": turns_to_wire(preamble, turns),
            "tools": [tool.to_wire()],
            "tool_choice": {"type": "function", "function": {"name": tool.name}},
        });
        let response = self.send(body).await?;

        let call = &response["choices"][0]["message"]["tool_calls"][0];
        let name = call["function"]["name"]
            .as_str()
            .ok_or_else(|| UpstreamError::msg("invalid tool response format"))?
            .to_string();
        let raw_arguments = call["function"]["arguments"]
            .as_str()
            .ok_or_else(|| UpstreamError::msg("invalid tool response format"))?;
        let arguments: Value = serde_json::from_str(raw_arguments)
            .map_err(|_| UpstreamError::msg("invalid tool response format"))?;

        Ok(ToolCall { name, arguments })
    }
}

/// Plain HTTP document fetcher.
pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpDocumentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        let response =
            self.client
                .get(parsed)
                .send()
                .await
                .map_err(|e| FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Client for a dedicated rerank endpoint (`POST {base}/rerank`).
pub struct HttpReranker {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpReranker {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>, UpstreamError> {
        let body = json!({
            "model": self.model,
            "query": query,
            "documents": candidates,
            "top_n": top_n,
        });
        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::msg(format!("rerank request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(UpstreamError::msg(format!(
                "rerank service returned {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::msg(format!("rerank response not json: {e}")))?;

        let results = payload["results"]
            .as_array()
            .ok_or_else(|| UpstreamError::msg("rerank response missing results"))?;

        let mut ranked = Vec::with_capacity(results.len());
        for entry in results {
            let index = entry["index"]
                .as_u64()
                .ok_or_else(|| UpstreamError::msg("rerank result missing index"))?;
            let relevance_score = entry["relevance_score"]
                .as_f64()
                .ok_or_else(|| UpstreamError::msg("rerank result missing relevance_score"))?;
            ranked.push(RankedCandidate {
                index: index as usize,
                relevance_score: relevance_score as f32,
            });
        }
        ranked.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(ranked)
    }
}

/// Client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    /// Inputs per request; larger batches are issued concurrently.
    batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
            model,
            batch_size: 64,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UpstreamError> {
        let body = json!({"model": self.model, "input": texts});
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::msg(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(UpstreamError::msg(format!(
                "embedding service returned {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::msg(format!("embedding response not json: {e}")))?;

        let data = payload["data"]
            .as_array()
            .ok_or_else(|| UpstreamError::msg("embedding response missing data"))?;

        data.iter()
            .map(|entry| {
                entry["embedding"]
                    .as_array()
                    .map(|xs| {
                        xs.iter()
                            .filter_map(|x| x.as_f64())
                            .map(|x| x as f32)
                            .collect()
                    })
                    .ok_or_else(|| UpstreamError::msg("embedding entry missing vector"))
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UpstreamError> {
        let futures = texts
            .chunks(self.batch_size)
            .map(|batch| self.embed_batch(batch));
        let batches = try_join_all(futures).await?;
        Ok(batches.into_iter().flatten().collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let input = [text.to_string()];
        let mut vectors = self.embed_batch(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| UpstreamError::msg("embedding response was empty"))
    }
}

/// Minimal posting client: `POST {base}/tweets` with a bearer token.
pub struct HttpSocialPoster {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl HttpSocialPoster {
    pub fn new(base_url: String, bearer_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            bearer_token,
        }
    }
}

#[async_trait]
impl SocialPoster for HttpSocialPoster {
    async fn post(&self, text: &str) -> Result<PostedTweet, PostingError> {
        let response = self
            .client
            .post(format!("{}/tweets", self.base_url))
            .bearer_auth(&self.bearer_token)
            .json(&json!({"text": text}))
            .send()
            .await
            .map_err(|e| PostingError {
                reason: format!("post request failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(PostingError {
                reason: format!("posting service returned {}", response.status()),
            });
        }

        let payload: Value = response.json().await.map_err(|e| PostingError {
            reason: format!("post response not json: {e}"),
        })?;

        let id = payload["data"]["id"]
            .as_str()
            .or_else(|| payload["id"].as_str())
            .ok_or_else(|| PostingError {
                reason: "post response missing id".to_string(),
            })?
            .to_string();

        Ok(PostedTweet {
            url: format!("https://twitter.com/i/web/status/{id}"),
            id,
            text: text.to_string(),
        })
    }
}

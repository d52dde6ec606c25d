//! Fake collaborators shared by the integration suites.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use civicflow::extract::ToolSpec;
use civicflow::message::Message;
use civicflow::services::{
    CompletionService, DocumentFetcher, FetchError, PostedTweet, PostingError, RankedCandidate,
    Reranker, SocialPoster, ToolCall, UpstreamError,
};

/// Completion service that replays scripted tool calls and texts in order.
#[derive(Default)]
pub struct ScriptedCompletion {
    tool_calls: Mutex<VecDeque<ToolCall>>,
    texts: Mutex<VecDeque<String>>,
    pub text_requests: AtomicUsize,
    pub tool_requests: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tool_call(&self, name: &str, arguments: Value) {
        self.tool_calls.lock().unwrap().push_back(ToolCall {
            name: name.to_string(),
            arguments,
        });
    }

    pub fn push_text(&self, text: &str) {
        self.texts.lock().unwrap().push_back(text.to_string());
    }

    pub fn text_request_count(&self) -> usize {
        self.text_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete_text(
        &self,
        _preamble: &str,
        _turns: &[Message],
    ) -> Result<String, UpstreamError> {
        self.text_requests.fetch_add(1, Ordering::SeqCst);
        self.texts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| UpstreamError::msg("no scripted text left"))
    }

    async fn complete_tool(
        &self,
        _preamble: &str,
        _turns: &[Message],
        _tool: &ToolSpec,
    ) -> Result<ToolCall, UpstreamError> {
        self.tool_requests.fetch_add(1, Ordering::SeqCst);
        self.tool_calls
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| UpstreamError::msg("no scripted tool call left"))
    }
}

/// Fetcher over a fixed url → document map; unknown urls return 404.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    pub fetch_count: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Reranker scoring by crude keyword overlap with the query.
pub struct KeywordReranker;

#[async_trait]
impl Reranker for KeywordReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>, UpstreamError> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .map(str::to_string)
            .collect();
        let mut ranked: Vec<RankedCandidate> = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let lowered = candidate.to_lowercase();
                let hits = terms.iter().filter(|t| lowered.contains(*t)).count();
                RankedCandidate {
                    index,
                    relevance_score: if terms.is_empty() {
                        0.5
                    } else {
                        hits as f32 / terms.len() as f32
                    },
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(top_n);
        Ok(ranked)
    }
}

/// Poster that fails the first `fail_times` posts, then succeeds.
#[derive(Default)]
pub struct ScriptedPoster {
    fail_remaining: AtomicUsize,
    pub post_count: AtomicUsize,
}

impl ScriptedPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(times: usize) -> Self {
        let poster = Self::default();
        poster.fail_remaining.store(times, Ordering::SeqCst);
        poster
    }

    pub fn posts(&self) -> usize {
        self.post_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocialPoster for ScriptedPoster {
    async fn post(&self, text: &str) -> Result<PostedTweet, PostingError> {
        self.post_count.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(PostingError {
                reason: "service unavailable".to_string(),
            });
        }
        Ok(PostedTweet {
            id: "1845".to_string(),
            text: text.to_string(),
            url: "https://twitter.com/i/web/status/1845".to_string(),
        })
    }
}

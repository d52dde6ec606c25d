//! Quick-analysis workflow.
//!
//! `Start → analyze_bill → [analyze_cbo?] → explainer → End`
//!
//! A lighter variant of the bill workflow: documents are fetched and reduced
//! to relevant passages once, and answers are written into a per-prompt
//! **question bank** (exact prompt text → cached answer) instead of a single
//! rolling summary. A repeated question is answered from the bank without
//! touching the completion service.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::graph::{GraphBuilder, GraphCompileError};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::retrieval::{self, RELEVANCE_FLOOR, TOP_PASSAGES, rewrite_query, select_relevant};
use crate::runtime::{AppRunner, Checkpointer, RunnerError};
use crate::services::{CompletionService, DocumentFetcher, Reranker};
use crate::state::{StateSnapshot, WorkflowState};
use crate::types::NodeKind;

use super::bill::DocumentRecord;
use super::{Services, SessionKey};

pub const ANALYZE_BILL: &str = "analyze_bill";
pub const ANALYZE_CBO: &str = "analyze_cbo";
pub const EXPLAINER: &str = "explainer";

const CHUNK_CHARS: usize = 1600;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickStatus {
    #[default]
    Init,
    Ready,
    Error,
}

/// Domain record for the quick-analysis workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickAnalysisState {
    pub prompt: String,
    pub bill: Option<DocumentRecord>,
    pub cbo: Option<DocumentRecord>,
    /// Exact prompt text → cached short answer.
    #[serde(default)]
    pub question_bank: BTreeMap<String, String>,
    pub status: QuickStatus,
    pub error: Option<String>,
}

impl QuickAnalysisState {
    /// The memoization predicate: has this exact prompt been answered?
    pub fn already_answered(&self, prompt: &str) -> bool {
        self.question_bank.contains_key(prompt)
    }

    fn cbo_pending(&self) -> bool {
        self.cbo
            .as_ref()
            .is_some_and(|record| record.content.is_none())
    }
}

// ---------------------------------------------------------------------------
// analyze_bill
// ---------------------------------------------------------------------------

/// Fetches the bill once and keeps the passages most relevant to the prompt.
pub struct AnalyzeBillNode {
    fetcher: Arc<dyn DocumentFetcher>,
    reranker: Arc<dyn Reranker>,
}

impl AnalyzeBillNode {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, reranker: Arc<dyn Reranker>) -> Self {
        Self { fetcher, reranker }
    }
}

#[async_trait]
impl Node<QuickAnalysisState> for AnalyzeBillNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<QuickAnalysisState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<QuickAnalysisState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        let Some(bill) = domain.bill.clone() else {
            return Err(NodeError::MissingInput { what: "bill.url" });
        };

        if bill.content.is_some() {
            // Passages survive the session; only the first turn pays for the
            // fetch.
            domain.status = QuickStatus::Ready;
            return Ok(NodePartial::new().with_domain(domain));
        }

        let text = match self.fetcher.fetch(&bill.url).await {
            Ok(text) => text,
            Err(e) => {
                domain.status = QuickStatus::Error;
                domain.error = Some(e.to_string());
                return Ok(NodePartial::new().with_domain(domain));
            }
        };

        let sections = retrieval::split_sections(&text);
        let passages: Vec<String> = if sections.is_empty() {
            retrieval::chunk_text(&text, CHUNK_CHARS)
        } else {
            sections.iter().map(|s| s.passage()).collect()
        };

        let query = rewrite_query(&domain.prompt);
        let ranked = match self.reranker.rerank(&query, &passages, TOP_PASSAGES).await {
            Ok(ranked) => ranked,
            Err(e) => {
                domain.status = QuickStatus::Error;
                domain.error = Some(e.message);
                return Ok(NodePartial::new().with_domain(domain));
            }
        };
        let selected: Vec<String> = select_relevant(ranked, RELEVANCE_FLOOR)
            .into_iter()
            .filter_map(|c| passages.get(c.index).cloned())
            .collect();

        ctx.emit("quick", format!("kept {} passages", selected.len()));
        domain.bill = Some(DocumentRecord {
            url: bill.url,
            content: Some(selected),
            summary: None,
        });
        domain.status = QuickStatus::Ready;
        domain.error = None;
        Ok(NodePartial::new().with_domain(domain))
    }
}

// ---------------------------------------------------------------------------
// analyze_cbo
// ---------------------------------------------------------------------------

/// Fetches the CBO document; failures degrade to an empty passage set.
pub struct AnalyzeCboNode {
    fetcher: Arc<dyn DocumentFetcher>,
    reranker: Arc<dyn Reranker>,
}

impl AnalyzeCboNode {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, reranker: Arc<dyn Reranker>) -> Self {
        Self { fetcher, reranker }
    }
}

#[async_trait]
impl Node<QuickAnalysisState> for AnalyzeCboNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<QuickAnalysisState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<QuickAnalysisState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        let Some(cbo) = domain.cbo.clone() else {
            return Ok(NodePartial::default());
        };
        if cbo.content.is_some() {
            return Ok(NodePartial::default());
        }

        let selected = match self.fetcher.fetch(&cbo.url).await {
            Ok(text) => {
                let chunks = retrieval::chunk_text(&text, CHUNK_CHARS);
                match self
                    .reranker
                    .rerank(retrieval::COST_QUERY, &chunks, TOP_PASSAGES)
                    .await
                {
                    Ok(ranked) => select_relevant(ranked, RELEVANCE_FLOOR)
                        .into_iter()
                        .filter_map(|c| chunks.get(c.index).cloned())
                        .collect(),
                    Err(e) => {
                        ctx.emit("quick", format!("cbo rerank failed: {}", e.message));
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                ctx.emit("quick", format!("cbo unavailable: {e}"));
                Vec::new()
            }
        };

        domain.cbo = Some(DocumentRecord {
            url: cbo.url,
            content: Some(selected),
            summary: None,
        });
        Ok(NodePartial::new().with_domain(domain))
    }
}

// ---------------------------------------------------------------------------
// explainer
// ---------------------------------------------------------------------------

const EXPLAINER_PREAMBLE: &str = "You answer questions about a bill using only the provided \
passages. Answer in a short paragraph; say so plainly if the passages do not cover the question.";

/// Answers the prompt from the retained passages, memoizing by exact prompt.
pub struct ExplainerNode {
    completion: Arc<dyn CompletionService>,
}

impl ExplainerNode {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl Node<QuickAnalysisState> for ExplainerNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<QuickAnalysisState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<QuickAnalysisState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        let prompt = domain.prompt.clone();
        if prompt.trim().is_empty() {
            return Err(NodeError::MissingInput { what: "prompt" });
        }

        if let Some(cached) = domain.question_bank.get(&prompt) {
            ctx.emit("quick", "question bank hit");
            return Ok(NodePartial::new().with_messages(vec![Message::assistant(cached)]));
        }

        let mut passages: Vec<String> = domain
            .bill
            .as_ref()
            .and_then(|b| b.content.clone())
            .unwrap_or_default();
        if let Some(cbo) = domain.cbo.as_ref().and_then(|c| c.content.clone()) {
            passages.extend(cbo);
        }

        let request = format!(
            "Question: {prompt}\n\nPassages:\n\n{}",
            passages.join("\n\n---\n\n")
        );
        let answer = match self
            .completion
            .complete_text(EXPLAINER_PREAMBLE, &[Message::user(&request)])
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                domain.status = QuickStatus::Error;
                domain.error = Some(e.message);
                return Ok(NodePartial::new().with_domain(domain));
            }
        };

        domain.question_bank.insert(prompt, answer.clone());
        domain.status = QuickStatus::Ready;
        domain.error = None;
        Ok(NodePartial::new()
            .with_domain(domain)
            .with_messages(vec![Message::assistant(&answer)]))
    }
}

// ---------------------------------------------------------------------------
// Routing & façade
// ---------------------------------------------------------------------------

/// Route out of `analyze_bill`. Total over [`QuickStatus`].
pub fn route_after_analyze(snapshot: &StateSnapshot<QuickAnalysisState>) -> NodeKind {
    match snapshot.domain.status {
        QuickStatus::Error => NodeKind::End,
        QuickStatus::Init | QuickStatus::Ready => {
            if snapshot.domain.cbo_pending() {
                NodeKind::Custom(ANALYZE_CBO.into())
            } else {
                NodeKind::Custom(EXPLAINER.into())
            }
        }
    }
}

/// Compile the quick-analysis graph.
pub fn build_graph(services: &Services) -> Result<App<QuickAnalysisState>, GraphCompileError> {
    GraphBuilder::new()
        .add_node(
            ANALYZE_BILL,
            AnalyzeBillNode::new(services.fetcher.clone(), services.reranker.clone()),
        )
        .add_node(
            ANALYZE_CBO,
            AnalyzeCboNode::new(services.fetcher.clone(), services.reranker.clone()),
        )
        .add_node(EXPLAINER, ExplainerNode::new(services.completion.clone()))
        .add_edge(NodeKind::Start, ANALYZE_BILL)
        .add_conditional_edge(ANALYZE_BILL, Arc::new(route_after_analyze))
        .add_edge(ANALYZE_CBO, EXPLAINER)
        .add_edge(EXPLAINER, NodeKind::End)
        .compile()
}

/// Session seed for a quick-analysis conversation.
#[derive(Clone, Debug)]
pub struct QuickSessionSeed {
    pub bill_url: String,
    pub cbo_url: Option<String>,
}

/// The quick-analysis façade.
pub struct QuickAnalysisWorkflow {
    runner: AppRunner<QuickAnalysisState>,
}

impl QuickAnalysisWorkflow {
    pub fn new(
        services: &Services,
        checkpointer: Arc<dyn Checkpointer<QuickAnalysisState>>,
    ) -> Result<Self, GraphCompileError> {
        let app = build_graph(services)?;
        Ok(Self {
            runner: AppRunner::new(app, checkpointer),
        })
    }

    pub async fn send(
        &self,
        key: &SessionKey,
        seed: &QuickSessionSeed,
        prompt: &str,
    ) -> Result<WorkflowState<QuickAnalysisState>, RunnerError> {
        let initial = WorkflowState::with_domain(QuickAnalysisState {
            bill: Some(DocumentRecord::new(&seed.bill_url)),
            cbo: seed.cbo_url.as_deref().map(DocumentRecord::new),
            ..Default::default()
        });
        let prompt = prompt.to_string();
        self.runner
            .invoke_with(&key.to_string(), initial, move |state| {
                state.push_message(Message::user(&prompt));
                let mut domain = state.domain.get().clone();
                domain.prompt = prompt;
                *state.domain.get_mut() = domain;
                state.domain.bump();
            })
            .await
    }

    pub async fn state(
        &self,
        key: &SessionKey,
    ) -> Result<Option<WorkflowState<QuickAnalysisState>>, RunnerError> {
        self.runner.get_state(&key.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(domain: QuickAnalysisState) -> StateSnapshot<QuickAnalysisState> {
        WorkflowState::with_domain(domain).snapshot()
    }

    #[test]
    fn router_is_total_over_statuses() {
        for status in [QuickStatus::Init, QuickStatus::Ready, QuickStatus::Error] {
            let snap = snapshot_with(QuickAnalysisState {
                status,
                ..Default::default()
            });
            let _ = route_after_analyze(&snap);
        }
    }

    #[test]
    fn routes_to_cbo_only_when_unfetched() {
        let pending = snapshot_with(QuickAnalysisState {
            status: QuickStatus::Ready,
            cbo: Some(DocumentRecord::new("https://example.gov/cbo")),
            ..Default::default()
        });
        assert_eq!(
            route_after_analyze(&pending),
            NodeKind::Custom(ANALYZE_CBO.into())
        );

        let fetched = snapshot_with(QuickAnalysisState {
            status: QuickStatus::Ready,
            cbo: Some(DocumentRecord {
                url: "https://example.gov/cbo".into(),
                content: Some(Vec::new()),
                summary: None,
            }),
            ..Default::default()
        });
        assert_eq!(
            route_after_analyze(&fetched),
            NodeKind::Custom(EXPLAINER.into())
        );
    }

    #[test]
    fn memoization_predicate_matches_exact_prompt() {
        let mut domain = QuickAnalysisState::default();
        domain
            .question_bank
            .insert("what does sec 2 do?".into(), "it defines terms".into());
        assert!(domain.already_answered("what does sec 2 do?"));
        assert!(!domain.already_answered("What does sec 2 do?"));
    }
}

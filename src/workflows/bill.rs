//! Bill analysis workflow.
//!
//! `Start → safety_check → bill_analyst → [cost_estimate?] → End`
//!
//! The safety screen classifies the prompt against a fixed policy before any
//! document work happens; the analyst fetches the bill text, extracts
//! numbered sections, reranks them against the (rewritten) user query, and
//! summarizes the survivors; the cost node does the same for the
//! cost-estimate document with a fixed query, degrading gracefully when that
//! document cannot be fetched.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::extract::{ExtractError, Extractor, FieldKind, ToolSchema, ToolSpec};
use crate::graph::{GraphBuilder, GraphCompileError};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::retrieval::{
    self, COST_QUERY, RELEVANCE_FLOOR, TOP_PASSAGES, rewrite_query, select_relevant,
};
use crate::runtime::{AppRunner, Checkpointer, RunnerError};
use crate::services::{CompletionService, DocumentFetcher, Reranker};
use crate::state::{StateSnapshot, WorkflowState};
use crate::types::NodeKind;

use super::{Services, SessionKey};

pub const SAFETY_CHECK: &str = "safety_check";
pub const BILL_ANALYST: &str = "bill_analyst";
pub const COST_ESTIMATE: &str = "cost_estimate";

/// Maximum chunk size when a document has no numbered sections.
const FALLBACK_CHUNK_CHARS: usize = 1600;

/// One analyzed (or pending) document.
///
/// `summary` is non-null only after a successful analysis step; once set, the
/// record is treated as immutable by later steps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub url: String,
    #[serde(default)]
    pub content: Option<Vec<String>>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl DocumentRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: None,
            summary: None,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        self.summary.is_some()
    }
}

/// Workflow status; the router branches on exactly this value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Init,
    FetchingMain,
    AnalyzingMain,
    Validated,
    Complete,
    Error,
}

/// Domain record for the bill analysis workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BillAnalysisState {
    /// The latest user utterance driving this step.
    pub prompt: String,
    pub main_bill: Option<DocumentRecord>,
    pub cost_estimate: Option<DocumentRecord>,
    #[serde(default)]
    pub related_bills: Vec<DocumentRecord>,
    pub status: AnalysisStatus,
    /// Set exactly when `status == Error`; cleared on successful retry.
    pub error: Option<String>,
    /// Threads this session into the Twitter engagement workflow.
    pub request_tweet_posting: bool,
}

impl BillAnalysisState {
    fn cost_pending(&self) -> bool {
        self.cost_estimate
            .as_ref()
            .is_some_and(|record| !record.is_analyzed())
    }
}

// ---------------------------------------------------------------------------
// safety_check
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SafetyRuling {
    Safe,
    Unsafe,
}

#[derive(Debug, Deserialize)]
struct ScreenVerdict {
    verdict: SafetyRuling,
    reason: String,
}

fn screen_tool() -> ToolSpec {
    ToolSpec::new(
        "screen_prompt",
        "Classify whether the user's prompt is in scope for a legislative-analysis assistant.",
        ToolSchema::object(vec![
            ToolSchema::required("verdict", FieldKind::Enum(&["safe", "unsafe"])),
            ToolSchema::required("reason", FieldKind::String),
        ]),
    )
}

const SCREEN_POLICY: &str = "You screen prompts for an assistant that discusses United States \
legislation. Questions about government, politics, public policy, specific bills, their costs, \
sponsors, and civic engagement are safe. Requests to write or debug code, requests unrelated to \
government or legislation, and harmful or abusive content are unsafe. Classify the latest user \
prompt and give a one-sentence reason.";

/// Screens the prompt against the fixed topic policy.
pub struct SafetyCheckNode {
    extractor: Extractor,
}

impl SafetyCheckNode {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            extractor: Extractor::new(completion),
        }
    }
}

#[async_trait]
impl Node<BillAnalysisState> for SafetyCheckNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<BillAnalysisState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<BillAnalysisState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        if domain.prompt.trim().is_empty() {
            // The façade sets the prompt each turn; fall back to the raw
            // message history for callers that drive the graph directly.
            match snapshot.last_user_message() {
                Some(message) => domain.prompt = message.content.clone(),
                None => return Err(NodeError::MissingInput { what: "prompt" }),
            }
        }
        ctx.emit("safety", "screening prompt");

        let turns = vec![Message::user(&domain.prompt)];
        match self
            .extractor
            .extract::<ScreenVerdict>(SCREEN_POLICY, &turns, &screen_tool())
            .await
        {
            Ok(ScreenVerdict {
                verdict: SafetyRuling::Safe,
                ..
            }) => {
                domain.status = AnalysisStatus::Validated;
                domain.error = None;
                Ok(NodePartial::new().with_domain(domain))
            }
            Ok(ScreenVerdict {
                verdict: SafetyRuling::Unsafe,
                reason,
            }) => {
                domain.status = AnalysisStatus::Error;
                domain.error = Some(reason.clone());
                let reply = format!(
                    "I can only help with questions about legislation and government. {reason}"
                );
                Ok(NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![Message::assistant(&reply)]))
            }
            Err(e) => {
                domain.status = AnalysisStatus::Error;
                domain.error = Some(match &e {
                    ExtractError::Validation { .. } => {
                        "could not interpret the safety screen; please rephrase".to_string()
                    }
                    ExtractError::Upstream(err) => err.message.clone(),
                });
                Ok(NodePartial::new().with_domain(domain))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// bill_analyst
// ---------------------------------------------------------------------------

const ANALYST_PREAMBLE: &str = "You are a legislative analyst. Summarize the provided bill \
sections for a general audience, focusing on what the user asked about. Be concrete about what \
the bill changes; do not speculate beyond the text.";

/// Fetches the bill text, extracts sections, reranks against the rewritten
/// query, and summarizes the most relevant passages.
pub struct BillAnalystNode {
    fetcher: Arc<dyn DocumentFetcher>,
    reranker: Arc<dyn Reranker>,
    completion: Arc<dyn CompletionService>,
}

impl BillAnalystNode {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        reranker: Arc<dyn Reranker>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            fetcher,
            reranker,
            completion,
        }
    }
}

#[async_trait]
impl Node<BillAnalysisState> for BillAnalystNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<BillAnalysisState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<BillAnalysisState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        let Some(main) = domain.main_bill.clone() else {
            return Err(NodeError::MissingInput {
                what: "main_bill.url",
            });
        };

        if main.is_analyzed() {
            // Idempotent skip: an existing summary is never rewritten.
            ctx.emit("analyst", "summary already present, skipping");
            return Ok(NodePartial::default());
        }

        let text = match self.fetcher.fetch(&main.url).await {
            Ok(text) => text,
            Err(e) => {
                // Bill text is the backbone of the session: a failed fetch is
                // fatal for this node.
                domain.status = AnalysisStatus::Error;
                domain.error = Some(e.to_string());
                return Ok(NodePartial::new().with_domain(domain));
            }
        };

        let sections = retrieval::split_sections(&text);
        let passages: Vec<String> = if sections.is_empty() {
            retrieval::chunk_text(&text, FALLBACK_CHUNK_CHARS)
        } else {
            sections.iter().map(|s| s.passage()).collect()
        };
        if passages.is_empty() {
            domain.status = AnalysisStatus::Error;
            domain.error = Some(format!("bill document at {} was empty", main.url));
            return Ok(NodePartial::new().with_domain(domain));
        }

        let query = rewrite_query(&domain.prompt);
        ctx.emit("analyst", format!("reranking {} passages", passages.len()));

        let ranked = match self.reranker.rerank(&query, &passages, TOP_PASSAGES).await {
            Ok(ranked) => ranked,
            Err(e) => {
                domain.status = AnalysisStatus::Error;
                domain.error = Some(e.message);
                return Ok(NodePartial::new().with_domain(domain));
            }
        };
        let selected: Vec<String> = select_relevant(ranked, RELEVANCE_FLOOR)
            .into_iter()
            .filter_map(|c| passages.get(c.index).cloned())
            .collect();

        let request = format!(
            "User question: {}\n\nRelevant bill sections:\n\n{}",
            domain.prompt,
            selected.join("\n\n---\n\n")
        );
        let summary = match self
            .completion
            .complete_text(ANALYST_PREAMBLE, &[Message::user(&request)])
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                domain.status = AnalysisStatus::Error;
                domain.error = Some(e.message);
                return Ok(NodePartial::new().with_domain(domain));
            }
        };

        let record = DocumentRecord {
            url: main.url,
            content: Some(selected),
            summary: Some(summary.clone()),
        };
        domain.main_bill = Some(record);
        domain.error = None;
        domain.status = if domain.cost_pending() {
            AnalysisStatus::AnalyzingMain
        } else {
            AnalysisStatus::Complete
        };

        Ok(NodePartial::new()
            .with_domain(domain)
            .with_messages(vec![Message::assistant(&summary)]))
    }
}

// ---------------------------------------------------------------------------
// cost_estimate
// ---------------------------------------------------------------------------

const COST_PREAMBLE: &str = "You are a legislative analyst. Summarize what the provided \
cost-estimate excerpts say about the bill's budgetary impact: spending, revenues, and the \
estimate window. Stick to the figures in the text.";

/// Fetches and summarizes the cost-estimate document with the fixed
/// cost/budget query; a failed fetch degrades to "no cost data" rather than
/// aborting the session.
pub struct CostEstimateNode {
    fetcher: Arc<dyn DocumentFetcher>,
    reranker: Arc<dyn Reranker>,
    completion: Arc<dyn CompletionService>,
}

impl CostEstimateNode {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        reranker: Arc<dyn Reranker>,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            fetcher,
            reranker,
            completion,
        }
    }
}

#[async_trait]
impl Node<BillAnalysisState> for CostEstimateNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<BillAnalysisState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<BillAnalysisState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        let Some(record) = domain.cost_estimate.clone() else {
            return Ok(NodePartial::default());
        };
        if record.is_analyzed() {
            return Ok(NodePartial::default());
        }

        let text = match self.fetcher.fetch(&record.url).await {
            Ok(text) => text,
            Err(e) => {
                // Deliberate degradation: the analysis proceeds without a
                // cost section.
                ctx.emit("cost", format!("cost estimate unavailable: {e}"));
                domain.cost_estimate = Some(DocumentRecord {
                    url: record.url,
                    content: Some(Vec::new()),
                    summary: None,
                });
                return Ok(NodePartial::new().with_domain(domain).with_messages(vec![
                    Message::assistant("No cost-estimate data is available for this bill."),
                ]));
            }
        };

        let chunks = retrieval::chunk_text(&text, FALLBACK_CHUNK_CHARS);
        if chunks.is_empty() {
            domain.cost_estimate = Some(DocumentRecord {
                url: record.url,
                content: Some(Vec::new()),
                summary: None,
            });
            return Ok(NodePartial::new().with_domain(domain));
        }

        let ranked = match self.reranker.rerank(COST_QUERY, &chunks, TOP_PASSAGES).await {
            Ok(ranked) => ranked,
            Err(e) => {
                domain.status = AnalysisStatus::Error;
                domain.error = Some(e.message);
                return Ok(NodePartial::new().with_domain(domain));
            }
        };
        let selected: Vec<String> = select_relevant(ranked, RELEVANCE_FLOOR)
            .into_iter()
            .filter_map(|c| chunks.get(c.index).cloned())
            .collect();

        let request = format!(
            "Cost-estimate excerpts:\n\n{}",
            selected.join("\n\n---\n\n")
        );
        let summary = match self
            .completion
            .complete_text(COST_PREAMBLE, &[Message::user(&request)])
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                domain.status = AnalysisStatus::Error;
                domain.error = Some(e.message);
                return Ok(NodePartial::new().with_domain(domain));
            }
        };

        domain.cost_estimate = Some(DocumentRecord {
            url: record.url,
            content: Some(selected),
            summary: Some(summary.clone()),
        });
        domain.status = AnalysisStatus::Complete;
        domain.error = None;

        Ok(NodePartial::new()
            .with_domain(domain)
            .with_messages(vec![Message::assistant(&summary)]))
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Route out of `safety_check`. Total over [`AnalysisStatus`].
pub fn route_after_safety(snapshot: &StateSnapshot<BillAnalysisState>) -> NodeKind {
    match snapshot.domain.status {
        AnalysisStatus::Error => NodeKind::End,
        AnalysisStatus::Init
        | AnalysisStatus::FetchingMain
        | AnalysisStatus::AnalyzingMain
        | AnalysisStatus::Validated
        | AnalysisStatus::Complete => NodeKind::Custom(BILL_ANALYST.into()),
    }
}

/// Route out of `bill_analyst`. Total over [`AnalysisStatus`].
pub fn route_after_analyst(snapshot: &StateSnapshot<BillAnalysisState>) -> NodeKind {
    match snapshot.domain.status {
        AnalysisStatus::Error => NodeKind::End,
        AnalysisStatus::Init
        | AnalysisStatus::FetchingMain
        | AnalysisStatus::AnalyzingMain
        | AnalysisStatus::Validated
        | AnalysisStatus::Complete => {
            if snapshot.domain.cost_pending() {
                NodeKind::Custom(COST_ESTIMATE.into())
            } else {
                NodeKind::End
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Façade
// ---------------------------------------------------------------------------

/// Compile the bill analysis graph against a services bundle.
pub fn build_graph(services: &Services) -> Result<App<BillAnalysisState>, GraphCompileError> {
    GraphBuilder::new()
        .add_node(SAFETY_CHECK, SafetyCheckNode::new(services.completion.clone()))
        .add_node(
            BILL_ANALYST,
            BillAnalystNode::new(
                services.fetcher.clone(),
                services.reranker.clone(),
                services.completion.clone(),
            ),
        )
        .add_node(
            COST_ESTIMATE,
            CostEstimateNode::new(
                services.fetcher.clone(),
                services.reranker.clone(),
                services.completion.clone(),
            ),
        )
        .add_edge(NodeKind::Start, SAFETY_CHECK)
        .add_conditional_edge(SAFETY_CHECK, Arc::new(route_after_safety))
        .add_conditional_edge(BILL_ANALYST, Arc::new(route_after_analyst))
        .add_edge(COST_ESTIMATE, NodeKind::End)
        .compile()
}

/// Session seed for a fresh bill conversation.
#[derive(Clone, Debug)]
pub struct BillSessionSeed {
    pub main_bill_url: String,
    pub cost_estimate_url: Option<String>,
    pub request_tweet_posting: bool,
}

/// The bill analysis façade: one compiled graph plus a runner.
pub struct BillAnalysisWorkflow {
    runner: AppRunner<BillAnalysisState>,
}

impl BillAnalysisWorkflow {
    pub fn new(
        services: &Services,
        checkpointer: Arc<dyn Checkpointer<BillAnalysisState>>,
    ) -> Result<Self, GraphCompileError> {
        let app = build_graph(services)?;
        Ok(Self {
            runner: AppRunner::new(app, checkpointer),
        })
    }

    /// Run one conversational turn to its terminal and return the final state.
    pub async fn send(
        &self,
        key: &SessionKey,
        seed: &BillSessionSeed,
        prompt: &str,
    ) -> Result<WorkflowState<BillAnalysisState>, RunnerError> {
        let initial = WorkflowState::with_domain(BillAnalysisState {
            main_bill: Some(DocumentRecord::new(&seed.main_bill_url)),
            cost_estimate: seed.cost_estimate_url.as_deref().map(DocumentRecord::new),
            request_tweet_posting: seed.request_tweet_posting,
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

    /// Latest persisted state for a session, if any.
    pub async fn state(
        &self,
        key: &SessionKey,
    ) -> Result<Option<WorkflowState<BillAnalysisState>>, RunnerError> {
        self.runner.get_state(&key.to_string()).await
    }
}

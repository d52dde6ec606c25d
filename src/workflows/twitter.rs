//! Twitter engagement workflow.
//!
//! A turn-based conversation that captures a constituent concern, offers the
//! bill's cosponsoring representatives, drafts candidate messages, and posts
//! the approved draft. Each user turn enters the graph through the `Start`
//! router, which dispatches on the process status; most nodes act once and
//! terminate the invocation so the conversation can wait for the next reply.
//! The exceptions are the in-run hops: a successful representative selection
//! flows straight into suggestion generation, and a "try again" reply loops
//! back to generation within the same invocation.
//!
//! Every user reply is interpreted by a schema-constrained extraction whose
//! outcome is a closed sum type; the routing matches are exhaustive over
//! those discriminants; an unhandled variant is a compile error here, not a
//! fallthrough.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::extract::{ExtractError, Extractor, FieldKind, ToolSchema, ToolSpec};
use crate::graph::{GraphBuilder, GraphCompileError};
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::runtime::{AppRunner, Checkpointer, RunnerError};
use crate::services::{CompletionService, SocialPoster};
use crate::state::{StateSnapshot, WorkflowState};
use crate::types::NodeKind;

use super::{Services, SessionKey};

pub const COLLECT_CONCERN: &str = "collect_concern";
pub const ANALYZE_COSPONSORS: &str = "analyze_cosponsors";
pub const SUGGEST_TWEETS: &str = "suggest_tweets";
pub const COMPOSE_TWEET: &str = "compose_tweet";

/// Default number of candidate messages to draft.
pub const DEFAULT_SUGGESTIONS: usize = 3;

// ---------------------------------------------------------------------------
// Domain record
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementStatus {
    #[default]
    Init,
    AwaitingRepresentativeSelection,
    GeneratingTweetSuggestions,
    AwaitingTweetSelection,
    AwaitingTweetApproval,
    RetryTweetPostError,
    Completed,
}

/// A structured constituent concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConcern {
    pub topic: String,
    pub description: String,
    #[serde(default)]
    pub bill_id: Option<String>,
    pub desired_outcome: String,
}

/// A representative offered for selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub handle: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcernCollection {
    pub user_concern: Option<UserConcern>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CosponsorsSelection {
    pub representatives: Vec<Representative>,
    pub selected_representative: Option<Representative>,
    pub user_verified_representative: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TweetTracker {
    pub drafts: Vec<String>,
    pub selected_index: Option<usize>,
}

/// The draft/approval/posted record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TweetRecord {
    pub text: String,
    pub approved: bool,
    pub posted_id: Option<String>,
    pub posted_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessManagement {
    pub status: EngagementStatus,
    pub error: Option<String>,
    pub retry_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementContext {
    /// Free-text hint surfaced to the user's next conversational turn.
    pub agent_message: Option<String>,
}

/// Domain record for the engagement workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementState {
    pub prompt: String,
    pub concern_collection: ConcernCollection,
    pub cosponsors_selection: CosponsorsSelection,
    pub tweet_tracker: TweetTracker,
    pub post: Option<TweetRecord>,
    pub process: ProcessManagement,
    pub context: EngagementContext,
    pub completed: bool,
}

impl EngagementState {
    fn hint(&mut self, message: impl Into<String>) -> Message {
        let message = message.into();
        self.context.agent_message = Some(message.clone());
        Message::assistant(&message)
    }

    fn representative_roster(&self) -> String {
        self.cosponsors_selection
            .representatives
            .iter()
            .enumerate()
            .map(|(i, rep)| format!("{}. {} ({})", i + 1, rep.name, rep.state))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Extraction outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
enum RepresentativeReply {
    /// 1-based index into the offered roster.
    Selected { index: usize },
    Skipped,
    Retry,
    Invalid,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
enum TweetReply {
    /// 1-based index into the drafted options.
    Selection { index: usize },
    /// The user wrote their own text instead.
    Suggestion { text: String },
    Retry,
    Invalid,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
enum ApprovalReply {
    Valid,
    Retry,
    Invalid,
}

fn concern_tool() -> ToolSpec {
    ToolSpec::new(
        "capture_concern",
        "Convert the user's free-text message into a structured constituent concern.",
        ToolSchema::object(vec![
            ToolSchema::required("topic", FieldKind::String),
            ToolSchema::required("description", FieldKind::String),
            ToolSchema::optional("bill_id", FieldKind::String),
            ToolSchema::required("desired_outcome", FieldKind::String),
        ]),
    )
}

fn representative_tool() -> ToolSpec {
    ToolSpec::new(
        "interpret_representative_reply",
        "Classify the user's reply to the offered list of representatives.",
        ToolSchema::object(vec![
            ToolSchema::required(
                "intent",
                FieldKind::Enum(&["selected", "skipped", "retry", "invalid"]),
            ),
            ToolSchema::optional("index", FieldKind::Integer),
        ]),
    )
}

fn tweet_reply_tool() -> ToolSpec {
    ToolSpec::new(
        "interpret_tweet_reply",
        "Classify the user's reply to the drafted message options.",
        ToolSchema::object(vec![
            ToolSchema::required(
                "intent",
                FieldKind::Enum(&["selection", "suggestion", "retry", "invalid"]),
            ),
            ToolSchema::optional("index", FieldKind::Integer),
            ToolSchema::optional("text", FieldKind::String),
        ]),
    )
}

fn approval_tool() -> ToolSpec {
    ToolSpec::new(
        "interpret_approval_reply",
        "Classify whether the user approved posting the drafted message.",
        ToolSchema::object(vec![ToolSchema::required(
            "intent",
            FieldKind::Enum(&["valid", "retry", "invalid"]),
        )]),
    )
}

fn extraction_failure_hint(e: &ExtractError) -> String {
    match e {
        ExtractError::Validation { .. } => {
            "I didn't quite follow that. Could you rephrase?".to_string()
        }
        ExtractError::Upstream(err) => format!(
            "I hit a temporary problem interpreting that ({}). Please try again.",
            err.message
        ),
    }
}

// ---------------------------------------------------------------------------
// collect_concern
// ---------------------------------------------------------------------------

const CONCERN_PREAMBLE: &str = "You help constituents turn a free-text message into a \
structured concern about legislation: a short topic, a description in their words, the bill id \
if they named one, and the outcome they want.";

/// Converts free text into a structured concern, then offers representatives.
pub struct CollectConcernNode {
    extractor: Extractor,
}

impl CollectConcernNode {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            extractor: Extractor::new(completion),
        }
    }
}

#[async_trait]
impl Node<EngagementState> for CollectConcernNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<EngagementState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<EngagementState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        if domain.prompt.trim().is_empty() {
            return Err(NodeError::MissingInput { what: "prompt" });
        }
        ctx.emit("engage", "collecting concern");

        match self
            .extractor
            .extract::<UserConcern>(CONCERN_PREAMBLE, &[Message::user(&domain.prompt)], &concern_tool())
            .await
        {
            Ok(concern) => {
                domain.concern_collection.user_concern = Some(concern);
                domain.process.status = EngagementStatus::AwaitingRepresentativeSelection;
                domain.process.error = None;
                let roster = domain.representative_roster();
                let message = domain.hint(format!(
                    "Got it. These representatives cosponsored the bill. Reply with a number \
to address one, or 0 to skip:\n{roster}"
                ));
                Ok(NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![message]))
            }
            Err(e) => {
                // Stays in Init; the next turn re-enters here.
                domain.process.retry_count += 1;
                let message = domain.hint(format!(
                    "{} Tell me what issue you care about and what you'd like to see happen.",
                    extraction_failure_hint(&e)
                ));
                Ok(NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![message]))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// analyze_cosponsors
// ---------------------------------------------------------------------------

const REPRESENTATIVE_PREAMBLE: &str = "The user was shown a numbered list of representatives \
and asked to pick one, reply 0 to skip, or ask for the list again. Classify their reply: \
`selected` with the 1-based index, `skipped` for 0 or declining, `retry` if they want the list \
again, `invalid` otherwise.";

/// Interprets the representative selection reply.
pub struct AnalyzeCosponsorsNode {
    extractor: Extractor,
}

impl AnalyzeCosponsorsNode {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            extractor: Extractor::new(completion),
        }
    }
}

#[async_trait]
impl Node<EngagementState> for AnalyzeCosponsorsNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<EngagementState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<EngagementState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        let roster = domain.representative_roster();
        let preamble = format!("{REPRESENTATIVE_PREAMBLE}\n\nThe offered list was:\n{roster}");

        let reply = match self
            .extractor
            .extract::<RepresentativeReply>(
                &preamble,
                &[Message::user(&domain.prompt)],
                &representative_tool(),
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                domain.process.retry_count += 1;
                let message = domain.hint(extraction_failure_hint(&e));
                return Ok(NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![message]));
            }
        };

        let message = match reply {
            RepresentativeReply::Selected { index } => {
                match index
                    .checked_sub(1)
                    .and_then(|i| domain.cosponsors_selection.representatives.get(i).cloned())
                {
                    Some(rep) => {
                        ctx.emit("engage", format!("representative selected: {}", rep.name));
                        domain.cosponsors_selection.selected_representative = Some(rep.clone());
                        domain.cosponsors_selection.user_verified_representative = true;
                        domain.process.status = EngagementStatus::GeneratingTweetSuggestions;
                        domain.process.error = None;
                        domain.hint(format!("Drafting message options addressed to {}.", rep.name))
                    }
                    None => domain.hint(format!(
                        "That number isn't on the list. Reply with a number between 1 and {}, \
or 0 to skip.",
                        domain.cosponsors_selection.representatives.len()
                    )),
                }
            }
            RepresentativeReply::Skipped => {
                domain.cosponsors_selection.selected_representative = None;
                domain.cosponsors_selection.user_verified_representative = true;
                domain.process.status = EngagementStatus::GeneratingTweetSuggestions;
                domain.process.error = None;
                domain.hint("No problem, drafting a general message instead.")
            }
            RepresentativeReply::Retry => {
                let roster = domain.representative_roster();
                domain.hint(format!(
                    "Here's the list again. Reply with a number, or 0 to skip:\n{roster}"
                ))
            }
            RepresentativeReply::Invalid => domain.hint(
                "Please reply with the number of a representative from the list, or 0 to skip.",
            ),
        };

        Ok(NodePartial::new()
            .with_domain(domain)
            .with_messages(vec![message]))
    }
}

// ---------------------------------------------------------------------------
// suggest_tweets
// ---------------------------------------------------------------------------

const DRAFTING_PREAMBLE: &str = "You draft short public messages (under 280 characters) a \
constituent could post about a bill. Write each option on its own numbered line. Be respectful \
and concrete; no hashtag spam.";

const TWEET_REPLY_PREAMBLE: &str = "The user was shown numbered draft messages and asked to \
pick one, supply their own text, or ask for new drafts. Classify their reply: `selection` with \
the 1-based index, `suggestion` with their own text, `retry` for new drafts, `invalid` \
otherwise.";

/// Drafts candidate messages, then interprets the user's pick.
pub struct SuggestTweetsNode {
    extractor: Extractor,
    completion: Arc<dyn CompletionService>,
    suggestions: usize,
}

impl SuggestTweetsNode {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            extractor: Extractor::new(completion.clone()),
            completion,
            suggestions: DEFAULT_SUGGESTIONS,
        }
    }

    /// Strip numbering/bullets and keep up to `n` non-empty lines.
    fn parse_drafts(text: &str, n: usize) -> Vec<String> {
        let drafts: Vec<String> = text
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(|c: char| c.is_ascii_digit())
                    .trim_start_matches(['.', ')', '-', '*'])
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .take(n)
            .collect();
        if drafts.is_empty() && !text.trim().is_empty() {
            vec![text.trim().to_string()]
        } else {
            drafts
        }
    }

    async fn generate(
        &self,
        mut domain: EngagementState,
        ctx: &NodeContext,
    ) -> NodePartial<EngagementState> {
        let concern = domain.concern_collection.user_concern.clone();
        let audience = domain
            .cosponsors_selection
            .selected_representative
            .as_ref()
            .map(|rep| format!("Address the message to {} ({}).", rep.name, rep.state))
            .unwrap_or_else(|| "Address the message to the public.".to_string());
        let concern_text = concern
            .map(|c| {
                format!(
                    "Topic: {}\nDescription: {}\nDesired outcome: {}{}",
                    c.topic,
                    c.description,
                    c.desired_outcome,
                    c.bill_id
                        .map(|id| format!("\nBill: {id}"))
                        .unwrap_or_default()
                )
            })
            .unwrap_or_else(|| domain.prompt.clone());
        let request = format!(
            "{audience}\n\nConstituent concern:\n{concern_text}\n\nDraft {} options.",
            self.suggestions
        );

        match self
            .completion
            .complete_text(DRAFTING_PREAMBLE, &[Message::user(&request)])
            .await
        {
            Ok(text) => {
                let drafts = Self::parse_drafts(&text, self.suggestions);
                ctx.emit("engage", format!("drafted {} options", drafts.len()));
                let listing = drafts
                    .iter()
                    .enumerate()
                    .map(|(i, d)| format!("{}. {d}", i + 1))
                    .collect::<Vec<_>>()
                    .join("\n");
                domain.tweet_tracker.drafts = drafts;
                domain.tweet_tracker.selected_index = None;
                domain.process.status = EngagementStatus::AwaitingTweetSelection;
                domain.process.error = None;
                let message = domain.hint(format!(
                    "Here are some options. Reply with a number to pick one, write your own, \
or say \"try again\" for fresh drafts:\n{listing}"
                ));
                NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![message])
            }
            Err(e) => {
                domain.process.retry_count += 1;
                domain.process.error = Some(e.message.clone());
                let message = domain.hint(format!(
                    "I couldn't draft messages just now ({}). Say \"try again\" to retry.",
                    e.message
                ));
                NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![message])
            }
        }
    }

    async fn interpret_selection(
        &self,
        mut domain: EngagementState,
        ctx: &NodeContext,
    ) -> NodePartial<EngagementState> {
        let listing = domain
            .tweet_tracker
            .drafts
            .iter()
            .enumerate()
            .map(|(i, d)| format!("{}. {d}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let preamble = format!("{TWEET_REPLY_PREAMBLE}\n\nThe drafts were:\n{listing}");

        let reply = match self
            .extractor
            .extract::<TweetReply>(&preamble, &[Message::user(&domain.prompt)], &tweet_reply_tool())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                domain.process.retry_count += 1;
                let message = domain.hint(extraction_failure_hint(&e));
                return NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![message]);
            }
        };

        let message = match reply {
            TweetReply::Selection { index } => {
                match index
                    .checked_sub(1)
                    .filter(|&i| i < domain.tweet_tracker.drafts.len())
                {
                    Some(i) => {
                        let text = domain.tweet_tracker.drafts[i].clone();
                        domain.tweet_tracker.selected_index = Some(i);
                        domain.post = Some(TweetRecord {
                            text: text.clone(),
                            ..Default::default()
                        });
                        domain.process.status = EngagementStatus::AwaitingTweetApproval;
                        domain.hint(format!(
                            "Ready to post:\n\n{text}\n\nShall I post it? (yes / try again)"
                        ))
                    }
                    None => domain.hint(format!(
                        "That number isn't one of the drafts. Reply with 1–{}.",
                        domain.tweet_tracker.drafts.len()
                    )),
                }
            }
            TweetReply::Suggestion { text } => {
                domain.tweet_tracker.selected_index = None;
                domain.post = Some(TweetRecord {
                    text: text.clone(),
                    ..Default::default()
                });
                domain.process.status = EngagementStatus::AwaitingTweetApproval;
                domain.hint(format!(
                    "Using your text:\n\n{text}\n\nShall I post it? (yes / try again)"
                ))
            }
            TweetReply::Retry => {
                ctx.emit("engage", "drafts rejected, regenerating");
                domain.tweet_tracker.drafts.clear();
                domain.tweet_tracker.selected_index = None;
                domain.process.status = EngagementStatus::GeneratingTweetSuggestions;
                domain.hint("Alright, drafting fresh options.")
            }
            TweetReply::Invalid => domain.hint(
                "Reply with the number of a draft, your own message text, or \"try again\".",
            ),
        };

        NodePartial::new()
            .with_domain(domain)
            .with_messages(vec![message])
    }
}

#[async_trait]
impl Node<EngagementState> for SuggestTweetsNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<EngagementState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<EngagementState>, NodeError> {
        let domain = snapshot.domain.clone();
        let selecting = domain.process.status == EngagementStatus::AwaitingTweetSelection
            && !domain.tweet_tracker.drafts.is_empty();
        if selecting {
            Ok(self.interpret_selection(domain, &ctx).await)
        } else {
            Ok(self.generate(domain, &ctx).await)
        }
    }
}

// ---------------------------------------------------------------------------
// compose_tweet
// ---------------------------------------------------------------------------

const APPROVAL_PREAMBLE: &str = "The user was shown a final draft and asked to approve \
posting it. Classify their reply: `valid` if they approve, `retry` if they want different \
drafts, `invalid` otherwise.";

/// Interprets the approval reply and posts the draft.
pub struct ComposeTweetNode {
    extractor: Extractor,
    poster: Arc<dyn SocialPoster>,
}

impl ComposeTweetNode {
    pub fn new(completion: Arc<dyn CompletionService>, poster: Arc<dyn SocialPoster>) -> Self {
        Self {
            extractor: Extractor::new(completion),
            poster,
        }
    }
}

#[async_trait]
impl Node<EngagementState> for ComposeTweetNode {
    async fn run(
        &self,
        snapshot: StateSnapshot<EngagementState>,
        ctx: NodeContext,
    ) -> Result<NodePartial<EngagementState>, NodeError> {
        let mut domain = snapshot.domain.clone();
        let Some(draft) = domain.post.clone() else {
            return Err(NodeError::MissingInput { what: "post.tweet" });
        };

        let reply = match self
            .extractor
            .extract::<ApprovalReply>(
                APPROVAL_PREAMBLE,
                &[Message::user(&domain.prompt)],
                &approval_tool(),
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                domain.process.retry_count += 1;
                let message = domain.hint(extraction_failure_hint(&e));
                return Ok(NodePartial::new()
                    .with_domain(domain)
                    .with_messages(vec![message]));
            }
        };

        let message = match reply {
            ApprovalReply::Valid => match self.poster.post(&draft.text).await {
                Ok(posted) => {
                    ctx.emit("engage", format!("posted {}", posted.id));
                    domain.post = Some(TweetRecord {
                        text: posted.text,
                        approved: true,
                        posted_id: Some(posted.id),
                        posted_url: Some(posted.url.clone()),
                    });
                    domain.process.status = EngagementStatus::Completed;
                    domain.process.error = None;
                    domain.completed = true;
                    domain.hint(format!("Posted! {}", posted.url))
                }
                Err(e) => {
                    domain.process.status = EngagementStatus::RetryTweetPostError;
                    domain.process.error = Some(e.reason.clone());
                    domain.process.retry_count += 1;
                    domain.hint(format!(
                        "Posting failed ({}). Say \"yes\" to try again or \"try again\" for \
different drafts.",
                        e.reason
                    ))
                }
            },
            ApprovalReply::Retry => {
                domain.post = None;
                domain.tweet_tracker.drafts.clear();
                domain.tweet_tracker.selected_index = None;
                domain.process.status = EngagementStatus::GeneratingTweetSuggestions;
                domain.hint("Alright, drafting fresh options.")
            }
            ApprovalReply::Invalid => {
                domain.hint("Reply \"yes\" to post the draft, or \"try again\" for new options.")
            }
        };

        Ok(NodePartial::new()
            .with_domain(domain)
            .with_messages(vec![message]))
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Entry router: dispatch each conversational turn by process status.
/// Total over [`EngagementStatus`].
pub fn route_entry(snapshot: &StateSnapshot<EngagementState>) -> NodeKind {
    if snapshot.domain.completed {
        return NodeKind::End;
    }
    match snapshot.domain.process.status {
        EngagementStatus::Init => NodeKind::Custom(COLLECT_CONCERN.into()),
        EngagementStatus::AwaitingRepresentativeSelection => {
            NodeKind::Custom(ANALYZE_COSPONSORS.into())
        }
        EngagementStatus::GeneratingTweetSuggestions
        | EngagementStatus::AwaitingTweetSelection => NodeKind::Custom(SUGGEST_TWEETS.into()),
        EngagementStatus::AwaitingTweetApproval | EngagementStatus::RetryTweetPostError => {
            NodeKind::Custom(COMPOSE_TWEET.into())
        }
        EngagementStatus::Completed => NodeKind::End,
    }
}

/// After the cosponsor reply: a verified selection flows straight into
/// drafting; everything else waits for the next user turn.
pub fn route_after_cosponsors(snapshot: &StateSnapshot<EngagementState>) -> NodeKind {
    match snapshot.domain.process.status {
        EngagementStatus::GeneratingTweetSuggestions => NodeKind::Custom(SUGGEST_TWEETS.into()),
        EngagementStatus::Init
        | EngagementStatus::AwaitingRepresentativeSelection
        | EngagementStatus::AwaitingTweetSelection
        | EngagementStatus::AwaitingTweetApproval
        | EngagementStatus::RetryTweetPostError
        | EngagementStatus::Completed => NodeKind::End,
    }
}

/// After a suggestion step: a retry loops back into generation within the
/// same invocation; otherwise wait for the user. A generation failure leaves
/// `process.error` set and exits instead of looping.
pub fn route_after_suggest(snapshot: &StateSnapshot<EngagementState>) -> NodeKind {
    match snapshot.domain.process.status {
        EngagementStatus::GeneratingTweetSuggestions
            if snapshot.domain.tweet_tracker.drafts.is_empty()
                && snapshot.domain.process.error.is_none() =>
        {
            NodeKind::Custom(SUGGEST_TWEETS.into())
        }
        EngagementStatus::Init
        | EngagementStatus::GeneratingTweetSuggestions
        | EngagementStatus::AwaitingRepresentativeSelection
        | EngagementStatus::AwaitingTweetSelection
        | EngagementStatus::AwaitingTweetApproval
        | EngagementStatus::RetryTweetPostError
        | EngagementStatus::Completed => NodeKind::End,
    }
}

/// After the approval step: "try again" loops back to drafting.
pub fn route_after_compose(snapshot: &StateSnapshot<EngagementState>) -> NodeKind {
    match snapshot.domain.process.status {
        EngagementStatus::GeneratingTweetSuggestions => NodeKind::Custom(SUGGEST_TWEETS.into()),
        EngagementStatus::Init
        | EngagementStatus::AwaitingRepresentativeSelection
        | EngagementStatus::AwaitingTweetSelection
        | EngagementStatus::AwaitingTweetApproval
        | EngagementStatus::RetryTweetPostError
        | EngagementStatus::Completed => NodeKind::End,
    }
}

// ---------------------------------------------------------------------------
// Façade
// ---------------------------------------------------------------------------

/// Compile the engagement graph.
pub fn build_graph(services: &Services) -> Result<App<EngagementState>, GraphCompileError> {
    GraphBuilder::new()
        .add_node(
            COLLECT_CONCERN,
            CollectConcernNode::new(services.completion.clone()),
        )
        .add_node(
            ANALYZE_COSPONSORS,
            AnalyzeCosponsorsNode::new(services.completion.clone()),
        )
        .add_node(
            SUGGEST_TWEETS,
            SuggestTweetsNode::new(services.completion.clone()),
        )
        .add_node(
            COMPOSE_TWEET,
            ComposeTweetNode::new(services.completion.clone(), services.poster.clone()),
        )
        .add_conditional_edge(NodeKind::Start, Arc::new(route_entry))
        .add_edge(COLLECT_CONCERN, NodeKind::End)
        .add_conditional_edge(ANALYZE_COSPONSORS, Arc::new(route_after_cosponsors))
        .add_conditional_edge(SUGGEST_TWEETS, Arc::new(route_after_suggest))
        .add_conditional_edge(COMPOSE_TWEET, Arc::new(route_after_compose))
        .compile()
}

/// Session seed for an engagement conversation.
#[derive(Clone, Debug, Default)]
pub struct EngagementSeed {
    /// Representatives offered for selection (the bill's cosponsors).
    pub representatives: Vec<Representative>,
}

/// The engagement façade.
pub struct TwitterEngagementWorkflow {
    runner: AppRunner<EngagementState>,
}

impl TwitterEngagementWorkflow {
    pub fn new(
        services: &Services,
        checkpointer: Arc<dyn Checkpointer<EngagementState>>,
    ) -> Result<Self, GraphCompileError> {
        let app = build_graph(services)?;
        Ok(Self {
            runner: AppRunner::new(app, checkpointer),
        })
    }

    pub async fn send(
        &self,
        key: &SessionKey,
        seed: &EngagementSeed,
        prompt: &str,
    ) -> Result<WorkflowState<EngagementState>, RunnerError> {
        let initial = WorkflowState::with_domain(EngagementState {
            cosponsors_selection: CosponsorsSelection {
                representatives: seed.representatives.clone(),
                ..Default::default()
            },
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
    ) -> Result<Option<WorkflowState<EngagementState>>, RunnerError> {
        self.runner.get_state(&key.to_string()).await
    }
}

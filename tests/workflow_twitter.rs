//! Twitter engagement workflow scenarios.

mod common;

use std::sync::Arc;

use serde_json::json;

use civicflow::runtime::InMemoryCheckpointer;
use civicflow::workflows::twitter::{
    EngagementSeed, EngagementStatus, Representative, TwitterEngagementWorkflow,
};
use civicflow::workflows::{Services, SessionKey};

use common::{KeywordReranker, ScriptedCompletion, ScriptedPoster, StaticFetcher};

struct Harness {
    workflow: TwitterEngagementWorkflow,
    completion: Arc<ScriptedCompletion>,
    poster: Arc<ScriptedPoster>,
}

fn harness(poster: ScriptedPoster) -> Harness {
    let completion = Arc::new(ScriptedCompletion::new());
    let poster = Arc::new(poster);
    let services = Services::new(
        completion.clone(),
        Arc::new(StaticFetcher::new()),
        Arc::new(KeywordReranker),
        poster.clone(),
    );
    let workflow =
        TwitterEngagementWorkflow::new(&services, Arc::new(InMemoryCheckpointer::new())).unwrap();
    Harness {
        workflow,
        completion,
        poster,
    }
}

fn key() -> SessionKey {
    SessionKey::new("user1", "room1", "hr3076")
}

fn seed() -> EngagementSeed {
    EngagementSeed {
        representatives: vec![
            Representative {
                name: "Rep. Example".into(),
                state: "VT".into(),
                handle: Some("@repexample".into()),
            },
            Representative {
                name: "Rep. Sample".into(),
                state: "OR".into(),
                handle: None,
            },
        ],
    }
}

fn push_concern(completion: &ScriptedCompletion) {
    completion.push_tool_call(
        "capture_concern",
        json!({
            "topic": "prescription drug prices",
            "description": "my copays doubled this year",
            "bill_id": "hr3076",
            "desired_outcome": "pass the bill",
        }),
    );
}

fn push_drafts(completion: &ScriptedCompletion, variant: &str) {
    completion.push_text(&format!(
        "1. Draft {variant} one about drug prices\n2. Draft {variant} two about copays\n3. Draft {variant} three about the bill"
    ));
}

#[tokio::test]
async fn collect_concern_then_awaits_representative() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);

    let state = h
        .workflow
        .send(&key(), &seed(), "I'm worried about drug prices, hr3076 should pass")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(
        domain.process.status,
        EngagementStatus::AwaitingRepresentativeSelection
    );
    let concern = domain.concern_collection.user_concern.as_ref().unwrap();
    assert_eq!(concern.topic, "prescription drug prices");
    assert_eq!(concern.bill_id.as_deref(), Some("hr3076"));
    // The roster was offered to the user.
    assert!(
        domain
            .context
            .agent_message
            .as_deref()
            .unwrap()
            .contains("Rep. Example")
    );
}

#[tokio::test]
async fn concern_extraction_failure_stays_in_init_with_hint() {
    let h = harness(ScriptedPoster::new());
    h.completion
        .push_tool_call("capture_concern", json!({"topic": "x"}));

    let state = h.workflow.send(&key(), &seed(), "ugh").await.unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.process.status, EngagementStatus::Init);
    assert!(domain.concern_collection.user_concern.is_none());
    assert_eq!(domain.process.retry_count, 1);
    assert!(domain.context.agent_message.is_some());
}

#[tokio::test]
async fn representative_selection_flows_into_drafting() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);
    h.workflow
        .send(&key(), &seed(), "drug prices are too high")
        .await
        .unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "selected", "index": 1}));
    push_drafts(&h.completion, "A");

    let state = h.workflow.send(&key(), &seed(), "1").await.unwrap();
    let domain = state.domain.get();
    assert_eq!(
        domain
            .cosponsors_selection
            .selected_representative
            .as_ref()
            .unwrap()
            .name,
        "Rep. Example"
    );
    assert!(domain.cosponsors_selection.user_verified_representative);
    assert_eq!(domain.process.status, EngagementStatus::AwaitingTweetSelection);
    assert_eq!(domain.tweet_tracker.drafts.len(), 3);
}

#[tokio::test]
async fn representative_skip_proceeds_without_selection() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);
    h.workflow
        .send(&key(), &seed(), "drug prices are too high")
        .await
        .unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "skipped"}));
    push_drafts(&h.completion, "A");

    let state = h.workflow.send(&key(), &seed(), "0").await.unwrap();
    let domain = state.domain.get();
    assert!(domain.cosponsors_selection.selected_representative.is_none());
    assert!(domain.cosponsors_selection.user_verified_representative);
    assert_eq!(domain.process.status, EngagementStatus::AwaitingTweetSelection);
    assert!(domain.process.error.is_none());
}

#[tokio::test]
async fn tweet_retry_clears_drafts_and_regenerates() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);
    h.workflow.send(&key(), &seed(), "drug prices").await.unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "selected", "index": 1}));
    push_drafts(&h.completion, "A");
    let state = h.workflow.send(&key(), &seed(), "1").await.unwrap();
    let first_drafts = state.domain.get().tweet_tracker.drafts.clone();

    // "none of these, try again" → retry classification → fresh drafts in
    // the same invocation.
    h.completion
        .push_tool_call("interpret_tweet_reply", json!({"intent": "retry"}));
    push_drafts(&h.completion, "B");

    let state = h
        .workflow
        .send(&key(), &seed(), "none of these, try again")
        .await
        .unwrap();
    let domain = state.domain.get();
    assert_eq!(domain.process.status, EngagementStatus::AwaitingTweetSelection);
    assert_eq!(domain.tweet_tracker.drafts.len(), 3);
    assert_ne!(domain.tweet_tracker.drafts, first_drafts);
    assert!(domain.tweet_tracker.selected_index.is_none());
}

#[tokio::test]
async fn approval_posts_and_completes() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);
    h.workflow.send(&key(), &seed(), "drug prices").await.unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "selected", "index": 2}));
    push_drafts(&h.completion, "A");
    h.workflow.send(&key(), &seed(), "2").await.unwrap();

    h.completion
        .push_tool_call("interpret_tweet_reply", json!({"intent": "selection", "index": 2}));
    h.workflow.send(&key(), &seed(), "2 please").await.unwrap();

    h.completion
        .push_tool_call("interpret_approval_reply", json!({"intent": "valid"}));
    let state = h.workflow.send(&key(), &seed(), "yes, post it").await.unwrap();

    let domain = state.domain.get();
    assert!(domain.completed);
    assert_eq!(domain.process.status, EngagementStatus::Completed);
    let post = domain.post.as_ref().unwrap();
    assert!(post.approved);
    assert_eq!(post.posted_id.as_deref(), Some("1845"));
    assert!(post.text.contains("two"));
    assert_eq!(h.poster.posts(), 1);
}

#[tokio::test]
async fn posting_failure_surfaces_retry_status_then_succeeds() {
    let h = harness(ScriptedPoster::failing_first(1));
    push_concern(&h.completion);
    h.workflow.send(&key(), &seed(), "drug prices").await.unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "skipped"}));
    push_drafts(&h.completion, "A");
    h.workflow.send(&key(), &seed(), "0").await.unwrap();

    h.completion
        .push_tool_call("interpret_tweet_reply", json!({"intent": "selection", "index": 1}));
    h.workflow.send(&key(), &seed(), "1").await.unwrap();

    // First approval attempt: the poster fails.
    h.completion
        .push_tool_call("interpret_approval_reply", json!({"intent": "valid"}));
    let state = h.workflow.send(&key(), &seed(), "yes").await.unwrap();
    let domain = state.domain.get();
    assert_eq!(domain.process.status, EngagementStatus::RetryTweetPostError);
    assert!(domain.process.error.as_deref().unwrap().contains("unavailable"));
    assert!(!domain.completed);

    // Second approval attempt succeeds.
    h.completion
        .push_tool_call("interpret_approval_reply", json!({"intent": "valid"}));
    let state = h.workflow.send(&key(), &seed(), "yes try again").await.unwrap();
    let domain = state.domain.get();
    assert_eq!(domain.process.status, EngagementStatus::Completed);
    assert!(domain.completed);
    assert_eq!(h.poster.posts(), 2);
}

#[tokio::test]
async fn own_text_suggestion_goes_to_approval() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);
    h.workflow.send(&key(), &seed(), "drug prices").await.unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "skipped"}));
    push_drafts(&h.completion, "A");
    h.workflow.send(&key(), &seed(), "0").await.unwrap();

    h.completion.push_tool_call(
        "interpret_tweet_reply",
        json!({"intent": "suggestion", "text": "My own words about hr3076."}),
    );
    let state = h
        .workflow
        .send(&key(), &seed(), "actually I'll write it: My own words about hr3076.")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.process.status, EngagementStatus::AwaitingTweetApproval);
    assert_eq!(
        domain.post.as_ref().unwrap().text,
        "My own words about hr3076."
    );
    assert!(domain.tweet_tracker.selected_index.is_none());
}

#[tokio::test]
async fn invalid_replies_reprompt_without_state_change() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);
    h.workflow.send(&key(), &seed(), "drug prices").await.unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "invalid"}));
    let state = h.workflow.send(&key(), &seed(), "purple").await.unwrap();

    let domain = state.domain.get();
    assert_eq!(
        domain.process.status,
        EngagementStatus::AwaitingRepresentativeSelection
    );
    assert!(domain.cosponsors_selection.selected_representative.is_none());
    assert!(!domain.cosponsors_selection.user_verified_representative);
}

#[tokio::test]
async fn out_of_range_selection_reprompts() {
    let h = harness(ScriptedPoster::new());
    push_concern(&h.completion);
    h.workflow.send(&key(), &seed(), "drug prices").await.unwrap();

    h.completion
        .push_tool_call("interpret_representative_reply", json!({"intent": "selected", "index": 9}));
    let state = h.workflow.send(&key(), &seed(), "9").await.unwrap();

    let domain = state.domain.get();
    assert_eq!(
        domain.process.status,
        EngagementStatus::AwaitingRepresentativeSelection
    );
    assert!(
        domain
            .context
            .agent_message
            .as_deref()
            .unwrap()
            .contains("between 1 and 2")
    );
}

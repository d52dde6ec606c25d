//! Bill analysis workflow scenarios, driven end-to-end with fake
//! collaborators.

mod common;

use std::sync::Arc;

use serde_json::json;

use civicflow::message::Message;
use civicflow::runtime::InMemoryCheckpointer;
use civicflow::workflows::bill::{
    AnalysisStatus, BillAnalysisWorkflow, BillSessionSeed,
};
use civicflow::workflows::{Services, SessionKey};

use common::{KeywordReranker, ScriptedCompletion, ScriptedPoster, StaticFetcher};

const BILL_URL: &str = "https://example.gov/bills/hr3076/text";
const CBO_URL: &str = "https://example.gov/cbo/hr3076";

const BILL_TEXT: &str = "\
SEC. 1. SHORT TITLE.
This Act may be cited as the Postal Service Reform Act.

SEC. 2. HEALTH BENEFITS PROGRAM.
The Director shall establish the Postal Service Health Benefits Program with provisions for \
annuitant enrollment.

SEC. 3. FUNDING.
There are authorized to be appropriated such sums as may be necessary for provisions of this Act.
";

const CBO_TEXT: &str = "\
CBO estimates that enacting this bill would decrease direct spending by 1.5 billion dollars \
over the 2022-2031 period.

The bill's budget impact stems from changed retiree health cost assumptions.
";

struct Harness {
    workflow: BillAnalysisWorkflow,
    completion: Arc<ScriptedCompletion>,
    fetcher: Arc<StaticFetcher>,
}

fn harness(pages: &[(&str, &str)]) -> Harness {
    let completion = Arc::new(ScriptedCompletion::new());
    let mut fetcher = StaticFetcher::new();
    for (url, body) in pages {
        fetcher = fetcher.with_page(url, body);
    }
    let fetcher = Arc::new(fetcher);
    let services = Services::new(
        completion.clone(),
        fetcher.clone(),
        Arc::new(KeywordReranker),
        Arc::new(ScriptedPoster::new()),
    );
    let workflow =
        BillAnalysisWorkflow::new(&services, Arc::new(InMemoryCheckpointer::new())).unwrap();
    Harness {
        workflow,
        completion,
        fetcher,
    }
}

fn key() -> SessionKey {
    SessionKey::new("user1", "room1", "hr3076")
}

fn seed_with_cost() -> BillSessionSeed {
    BillSessionSeed {
        main_bill_url: BILL_URL.to_string(),
        cost_estimate_url: Some(CBO_URL.to_string()),
        request_tweet_posting: false,
    }
}

fn push_safe_verdict(completion: &ScriptedCompletion) {
    completion.push_tool_call(
        "screen_prompt",
        json!({"verdict": "safe", "reason": "legislative question"}),
    );
}

#[tokio::test]
async fn safety_rejection_terminates_without_analysis() {
    let h = harness(&[(BILL_URL, BILL_TEXT)]);
    h.completion.push_tool_call(
        "screen_prompt",
        json!({"verdict": "unsafe", "reason": "Code generation is out of scope."}),
    );

    let state = h
        .workflow
        .send(
            &key(),
            &seed_with_cost(),
            "write me a Python web scraper for congress.gov",
        )
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.status, AnalysisStatus::Error);
    assert!(!domain.error.as_deref().unwrap_or_default().is_empty());
    assert!(domain.main_bill.as_ref().unwrap().summary.is_none());
    // The graph terminated before the analyst: nothing was fetched.
    assert_eq!(h.fetcher.fetches(), 0);
}

#[tokio::test]
async fn happy_path_summarizes_bill_and_cost_estimate() {
    let h = harness(&[(BILL_URL, BILL_TEXT), (CBO_URL, CBO_TEXT)]);
    push_safe_verdict(&h.completion);
    h.completion.push_text("The bill reforms postal health benefits.");
    h.completion.push_text("CBO projects 1.5B in savings over ten years.");

    let state = h
        .workflow
        .send(&key(), &seed_with_cost(), "what does this bill change about health benefits?")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.status, AnalysisStatus::Complete);
    assert_eq!(
        domain.main_bill.as_ref().unwrap().summary.as_deref(),
        Some("The bill reforms postal health benefits.")
    );
    assert_eq!(
        domain.cost_estimate.as_ref().unwrap().summary.as_deref(),
        Some("CBO projects 1.5B in savings over ten years.")
    );
    assert!(domain.error.is_none());

    // Both summaries surfaced as assistant turns, after the user turn.
    let assistant_turns: Vec<&str> = state
        .messages
        .get()
        .iter()
        .filter(|m| m.has_role(Message::ASSISTANT))
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(assistant_turns.len(), 2);
}

#[tokio::test]
async fn summaries_are_written_at_most_once() {
    let h = harness(&[(BILL_URL, BILL_TEXT), (CBO_URL, CBO_TEXT)]);
    push_safe_verdict(&h.completion);
    h.completion.push_text("First summary.");
    h.completion.push_text("Cost summary.");

    h.workflow
        .send(&key(), &seed_with_cost(), "what does the bill do?")
        .await
        .unwrap();
    let texts_after_first = h.completion.text_request_count();

    // Second turn on the same session: analyst and cost node both skip.
    push_safe_verdict(&h.completion);
    let state = h
        .workflow
        .send(&key(), &seed_with_cost(), "tell me more about the funding")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(
        domain.main_bill.as_ref().unwrap().summary.as_deref(),
        Some("First summary.")
    );
    assert_eq!(h.completion.text_request_count(), texts_after_first);
}

#[tokio::test]
async fn missing_cost_document_degrades_gracefully() {
    // CBO url seeded but the document 404s.
    let h = harness(&[(BILL_URL, BILL_TEXT)]);
    push_safe_verdict(&h.completion);
    h.completion.push_text("Main summary.");

    let state = h
        .workflow
        .send(&key(), &seed_with_cost(), "what does this bill change?")
        .await
        .unwrap();

    let domain = state.domain.get();
    // Main analysis succeeded; the cost record is an empty-result sentinel.
    assert!(domain.main_bill.as_ref().unwrap().summary.is_some());
    let cost = domain.cost_estimate.as_ref().unwrap();
    assert!(cost.summary.is_none());
    assert_eq!(cost.content.as_ref().map(Vec::len), Some(0));
    assert!(domain.error.is_none());
}

#[tokio::test]
async fn failed_bill_fetch_is_fatal_for_the_node() {
    // No pages at all: the main bill fetch 404s.
    let h = harness(&[]);
    push_safe_verdict(&h.completion);

    let state = h
        .workflow
        .send(&key(), &seed_with_cost(), "what does this bill change?")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.status, AnalysisStatus::Error);
    assert!(domain.error.as_deref().unwrap().contains("404"));
    assert!(domain.main_bill.as_ref().unwrap().summary.is_none());
}

#[tokio::test]
async fn error_clears_on_successful_retry() {
    let h = harness(&[(BILL_URL, BILL_TEXT)]);
    // First turn is rejected by the screen.
    h.completion.push_tool_call(
        "screen_prompt",
        json!({"verdict": "unsafe", "reason": "off topic"}),
    );
    let state = h
        .workflow
        .send(
            &key(),
            &BillSessionSeed {
                main_bill_url: BILL_URL.to_string(),
                cost_estimate_url: None,
                request_tweet_posting: false,
            },
            "what's a good pasta recipe?",
        )
        .await
        .unwrap();
    assert_eq!(state.domain.get().status, AnalysisStatus::Error);

    // Second turn is on topic; the error field resets.
    push_safe_verdict(&h.completion);
    h.completion.push_text("Summary after retry.");
    let state = h
        .workflow
        .send(
            &key(),
            &BillSessionSeed {
                main_bill_url: BILL_URL.to_string(),
                cost_estimate_url: None,
                request_tweet_posting: false,
            },
            "ok, what does the bill actually do?",
        )
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.status, AnalysisStatus::Complete);
    assert!(domain.error.is_none());
}

#[tokio::test]
async fn message_history_is_append_only_across_turns() {
    let h = harness(&[(BILL_URL, BILL_TEXT)]);
    push_safe_verdict(&h.completion);
    h.completion.push_text("Summary one.");

    let seed = BillSessionSeed {
        main_bill_url: BILL_URL.to_string(),
        cost_estimate_url: None,
        request_tweet_posting: false,
    };
    let first = h.workflow.send(&key(), &seed, "first question").await.unwrap();
    let first_messages = first.messages.get().clone();

    push_safe_verdict(&h.completion);
    let second = h.workflow.send(&key(), &seed, "second question").await.unwrap();
    let second_messages = second.messages.get();

    assert!(second_messages.len() >= first_messages.len());
    assert_eq!(&second_messages[..first_messages.len()], &first_messages[..]);
}

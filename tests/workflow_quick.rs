//! Quick-analysis workflow scenarios, including question-bank memoization.

mod common;

use std::sync::Arc;

use civicflow::runtime::InMemoryCheckpointer;
use civicflow::workflows::quick::{QuickAnalysisWorkflow, QuickSessionSeed, QuickStatus};
use civicflow::workflows::{Services, SessionKey};

use common::{KeywordReranker, ScriptedCompletion, ScriptedPoster, StaticFetcher};

const BILL_URL: &str = "https://example.gov/bills/s1234/text";
const CBO_URL: &str = "https://example.gov/cbo/s1234";

const BILL_TEXT: &str = "\
SEC. 1. SHORT TITLE.
This Act may be cited as the Water Access Act.

SEC. 2. GRANTS.
The Secretary may award grants for rural water infrastructure projects.
";

const CBO_TEXT: &str = "\
CBO estimates the bill would cost 200 million dollars over five years.
";

struct Harness {
    workflow: QuickAnalysisWorkflow,
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
        QuickAnalysisWorkflow::new(&services, Arc::new(InMemoryCheckpointer::new())).unwrap();
    Harness {
        workflow,
        completion,
        fetcher,
    }
}

fn key() -> SessionKey {
    SessionKey::new("user1", "room1", "s1234")
}

fn seed() -> QuickSessionSeed {
    QuickSessionSeed {
        bill_url: BILL_URL.to_string(),
        cbo_url: Some(CBO_URL.to_string()),
    }
}

#[tokio::test]
async fn answers_land_in_the_question_bank() {
    let h = harness(&[(BILL_URL, BILL_TEXT), (CBO_URL, CBO_TEXT)]);
    h.completion.push_text("It funds rural water grants.");

    let state = h
        .workflow
        .send(&key(), &seed(), "what do the grants cover?")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.status, QuickStatus::Ready);
    assert_eq!(
        domain.question_bank.get("what do the grants cover?").map(String::as_str),
        Some("It funds rural water grants.")
    );
    // Both documents were pulled exactly once.
    assert_eq!(h.fetcher.fetches(), 2);
}

#[tokio::test]
async fn repeated_question_is_served_from_the_bank() {
    let h = harness(&[(BILL_URL, BILL_TEXT), (CBO_URL, CBO_TEXT)]);
    h.completion.push_text("It funds rural water grants.");

    h.workflow
        .send(&key(), &seed(), "what do the grants cover?")
        .await
        .unwrap();
    let texts_after_first = h.completion.text_request_count();

    // The exact same prompt again: no new completion call.
    let state = h
        .workflow
        .send(&key(), &seed(), "what do the grants cover?")
        .await
        .unwrap();

    assert_eq!(h.completion.text_request_count(), texts_after_first);
    let answers: Vec<&str> = state
        .messages
        .get()
        .iter()
        .filter(|m| m.has_role(civicflow::message::Message::ASSISTANT))
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(answers, vec!["It funds rural water grants.", "It funds rural water grants."]);
}

#[tokio::test]
async fn different_question_triggers_a_fresh_answer() {
    let h = harness(&[(BILL_URL, BILL_TEXT), (CBO_URL, CBO_TEXT)]);
    h.completion.push_text("It funds rural water grants.");
    h.completion.push_text("About 200 million over five years.");

    h.workflow
        .send(&key(), &seed(), "what do the grants cover?")
        .await
        .unwrap();
    let state = h
        .workflow
        .send(&key(), &seed(), "how much does it cost?")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.question_bank.len(), 2);
    // Documents were not fetched again for the second question.
    assert_eq!(h.fetcher.fetches(), 2);
}

#[tokio::test]
async fn missing_cbo_document_degrades_to_empty_passages() {
    let h = harness(&[(BILL_URL, BILL_TEXT)]);
    h.completion.push_text("It funds rural water grants.");

    let state = h
        .workflow
        .send(&key(), &seed(), "what do the grants cover?")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.status, QuickStatus::Ready);
    assert_eq!(
        domain.cbo.as_ref().unwrap().content.as_ref().map(Vec::len),
        Some(0)
    );
    assert!(domain.question_bank.contains_key("what do the grants cover?"));
}

#[tokio::test]
async fn failed_bill_fetch_sets_error_status() {
    let h = harness(&[]);

    let state = h
        .workflow
        .send(&key(), &seed(), "what do the grants cover?")
        .await
        .unwrap();

    let domain = state.domain.get();
    assert_eq!(domain.status, QuickStatus::Error);
    assert!(domain.error.is_some());
    assert!(domain.question_bank.is_empty());
}

//! End-to-end walkthrough of the bill analysis workflow with canned
//! collaborators, so it runs without network access or API keys.
//!
//! ```bash
//! cargo run --example bill_walkthrough
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use civicflow::extract::ToolSpec;
use civicflow::message::Message;
use civicflow::runtime::InMemoryCheckpointer;
use civicflow::services::{
    CompletionService, DocumentFetcher, FetchError, PostedTweet, PostingError, RankedCandidate,
    Reranker, SocialPoster, ToolCall, UpstreamError,
};
use civicflow::telemetry;
use civicflow::workflows::bill::{BillAnalysisWorkflow, BillSessionSeed};
use civicflow::workflows::{Services, SessionKey};

const BILL_URL: &str = "https://example.gov/bills/hr3076/text";
const CBO_URL: &str = "https://example.gov/cbo/hr3076";

/// Answers every screen with "safe" and every summary request with canned
/// prose.
struct CannedCompletion;

#[async_trait]
impl CompletionService for CannedCompletion {
    async fn complete_text(
        &self,
        preamble: &str,
        _turns: &[Message],
    ) -> Result<String, UpstreamError> {
        if preamble.contains("cost-estimate") {
            Ok("CBO projects roughly $1.5 billion in net savings over ten years, mostly from \
retiree health integration."
                .to_string())
        } else {
            Ok("The bill restructures postal retiree health benefits and requires integrated \
Medicare enrollment for annuitants."
                .to_string())
        }
    }

    async fn complete_tool(
        &self,
        _preamble: &str,
        _turns: &[Message],
        tool: &ToolSpec,
    ) -> Result<ToolCall, UpstreamError> {
        Ok(ToolCall {
            name: tool.name.to_string(),
            arguments: serde_json::json!({"verdict": "safe", "reason": "legislative question"}),
        })
    }
}

struct CannedFetcher {
    pages: HashMap<&'static str, &'static str>,
}

#[async_trait]
impl DocumentFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .map(|s| s.to_string())
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

struct FlatReranker;

#[async_trait]
impl Reranker for FlatReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>, UpstreamError> {
        Ok(candidates
            .iter()
            .take(top_n)
            .enumerate()
            .map(|(index, _)| RankedCandidate {
                index,
                relevance_score: 0.8,
            })
            .collect())
    }
}

struct NoopPoster;

#[async_trait]
impl SocialPoster for NoopPoster {
    async fn post(&self, text: &str) -> Result<PostedTweet, PostingError> {
        Ok(PostedTweet {
            id: "0".to_string(),
            text: text.to_string(),
            url: "https://example.invalid".to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let fetcher = CannedFetcher {
        pages: HashMap::from([
            (
                BILL_URL,
                "SEC. 1. SHORT TITLE.\nThis Act may be cited as the Postal Service Reform Act.\n\n\
SEC. 2. HEALTH BENEFITS.\nThe Director shall establish the Postal Service Health Benefits \
Program.\n",
            ),
            (
                CBO_URL,
                "CBO estimates enacting this bill would decrease direct spending by $1.5 billion \
over the 2022-2031 period.\n",
            ),
        ]),
    };

    let services = Services::new(
        Arc::new(CannedCompletion),
        Arc::new(fetcher),
        Arc::new(FlatReranker),
        Arc::new(NoopPoster),
    );
    let workflow = BillAnalysisWorkflow::new(&services, Arc::new(InMemoryCheckpointer::new()))?;

    let key = SessionKey::new("demo-user", "demo-room", "hr3076");
    let seed = BillSessionSeed {
        main_bill_url: BILL_URL.to_string(),
        cost_estimate_url: Some(CBO_URL.to_string()),
        request_tweet_posting: false,
    };

    let state = workflow
        .send(&key, &seed, "What does this bill change about health benefits?")
        .await?;

    let domain = state.domain.get();
    info!(status = ?domain.status, "walkthrough complete");
    for message in state.messages.get() {
        info!(role = %message.role, "{}", message.content);
    }
    if let Some(summary) = domain.main_bill.as_ref().and_then(|b| b.summary.as_deref()) {
        info!("bill summary: {summary}");
    }
    if let Some(summary) = domain
        .cost_estimate
        .as_ref()
        .and_then(|c| c.summary.as_deref())
    {
        info!("cost summary: {summary}");
    }

    Ok(())
}

//! Workflow façades.
//!
//! Three independently compiled graphs share the same engine and
//! conventions:
//!
//! - [`bill`]: full bill analysis (safety screen, bill text analysis,
//!   cost-estimate analysis)
//! - [`quick`]: lighter per-question analysis with a memoizing question bank
//! - [`twitter`]: the constituent-engagement conversation that drafts and
//!   posts a message to a representative
//!
//! Each façade owns an [`AppRunner`](crate::runtime::AppRunner) and exposes
//! `send` (load-or-init the session, append the user turn, run to terminal)
//! and `state` (latest persisted state). Collaborators arrive through one
//! [`Services`] bundle, injected at construction time.

pub mod bill;
pub mod quick;
pub mod session;
pub mod twitter;

pub use session::SessionKey;

use std::sync::Arc;

use crate::services::{CompletionService, DocumentFetcher, Reranker, SocialPoster};

/// The collaborator bundle the workflows are composed from.
#[derive(Clone)]
pub struct Services {
    pub completion: Arc<dyn CompletionService>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub reranker: Arc<dyn Reranker>,
    pub poster: Arc<dyn SocialPoster>,
}

impl Services {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        fetcher: Arc<dyn DocumentFetcher>,
        reranker: Arc<dyn Reranker>,
        poster: Arc<dyn SocialPoster>,
    ) -> Self {
        Self {
            completion,
            fetcher,
            reranker,
            poster,
        }
    }
}

//! Embedding-based fallback reranker.
//!
//! When no dedicated rerank endpoint is configured, candidates are scored by
//! cosine similarity between their embeddings and the query embedding. Scores
//! land in the same 0..1-ish range the rerank endpoints report, so the
//! relevance floor in the retrieval layer applies unchanged.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Embedder, RankedCandidate, Reranker, UpstreamError};

/// Cosine-similarity reranker over an [`Embedder`].
pub struct SimilarityReranker {
    embedder: Arc<dyn Embedder>,
}

impl SimilarityReranker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl Reranker for SimilarityReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_n: usize,
    ) -> Result<Vec<RankedCandidate>, UpstreamError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let candidate_vectors = self.embedder.embed(candidates).await?;
        if candidate_vectors.len() != candidates.len() {
            return Err(UpstreamError::msg(format!(
                "embedder returned {} vectors for {} candidates",
                candidate_vectors.len(),
                candidates.len()
            )));
        }

        let mut ranked: Vec<RankedCandidate> = candidate_vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| RankedCandidate {
                index,
                relevance_score: cosine(&query_vector, vector),
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

#[cfg(test)]
mod tests {
    use super::*;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, UpstreamError> {
            // "cost"-flavored strings point along x, everything else along y.
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("cost") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
            Ok(self.embed(&[text.to_string()]).await?.remove(0))
        }
    }

    #[tokio::test]
    async fn ranks_by_cosine_similarity() {
        let reranker = SimilarityReranker::new(Arc::new(AxisEmbedder));
        let candidates = vec![
            "general provisions".to_string(),
            "cost of the program".to_string(),
        ];
        let ranked = reranker
            .rerank("cost and budget impact", &candidates, 2)
            .await
            .unwrap();
        assert_eq!(ranked[0].index, 1);
        assert!(ranked[0].relevance_score > ranked[1].relevance_score);
    }

    #[tokio::test]
    async fn empty_candidates_yield_empty_ranking() {
        let reranker = SimilarityReranker::new(Arc::new(AxisEmbedder));
        let ranked = reranker.rerank("anything", &[], 3).await.unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}

//! Retrieval contract
//!
//! Every retriever returns at most `MAX_PASSAGES` passages, each scoring at
//! or above the requested threshold, ordered by descending score. Backends
//! only produce scored candidates; `apply_contract` enforces the rest.

mod vector;

pub use vector::{chunk_id, IndexedChunk, VectorStore};

use docguard_common::errors::Result;
use docguard_common::{RetrievedPassage, MAX_PASSAGES};

/// Common trait for all retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve passages relevant to the query
    async fn retrieve(&self, query: &str, score_threshold: f32) -> Result<Vec<RetrievedPassage>>;
}

/// Filter, order and cap scored candidates
pub fn apply_contract(
    mut passages: Vec<RetrievedPassage>,
    score_threshold: f32,
    top_k: usize,
) -> Vec<RetrievedPassage> {
    passages.retain(|p| p.relevance_score.is_finite() && p.relevance_score >= score_threshold);
    // Stable sort: equal scores keep index order
    passages.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    passages.truncate(top_k.min(MAX_PASSAGES));
    passages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(text: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage {
            text: text.to_string(),
            source_id: "doc.pdf".to_string(),
            page_number: Some(0),
            relevance_score: score,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let out = apply_contract(vec![scored("a", 0.30), scored("b", 0.29)], 0.30, 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "a");
    }

    #[test]
    fn test_sorted_descending_and_capped() {
        let out = apply_contract(
            vec![
                scored("low", 0.4),
                scored("top", 0.9),
                scored("mid", 0.6),
                scored("second", 0.8),
                scored("nan", f32::NAN),
            ],
            0.3,
            10,
        );

        let texts: Vec<_> = out.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["top", "second", "mid"]);
    }

    #[test]
    fn test_top_k_below_cap() {
        let out = apply_contract(vec![scored("a", 0.9), scored("b", 0.8)], 0.0, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "a");
    }

    #[test]
    fn test_nothing_passes() {
        assert!(apply_contract(vec![scored("a", 0.1)], 0.3, 3).is_empty());
    }
}

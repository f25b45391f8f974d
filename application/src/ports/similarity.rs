//! Similarity measurer port
//!
//! Scores semantic closeness of two response texts in [0, 1]. The resilient
//! infrastructure implementation never returns an error (it degrades to a
//! deterministic lexical algorithm on upstream failure); the orchestrator
//! still tolerates `Err` from other implementations by freezing the round's
//! similarity at the previous value.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a similarity implementation may surface
#[derive(Error, Debug, Clone)]
pub enum SimilarityError {
    #[error("embedding request failed: {0}")]
    Upstream(String),

    #[error("similarity measurer unavailable: {0}")]
    Unavailable(String),
}

/// Scores semantic closeness between two texts
///
/// Implementations must be symmetric and clamp results to [0, 1].
#[async_trait]
pub trait SimilarityMeasurer: Send + Sync {
    /// Score `text1` against `text2`, optionally pinning the embedding model
    async fn calculate_text_similarity(
        &self,
        text1: &str,
        text2: &str,
        model: Option<&str>,
    ) -> Result<f64, SimilarityError>;
}

//! Resilient similarity measurement
//!
//! [`ResilientSimilarityMeasurer`] scores text pairs through an upstream
//! embedding service and degrades to the deterministic lexical algorithm
//! when that service misbehaves: a failed pair is scored lexically on the
//! spot, and after enough consecutive failures the measurer latches into
//! lexical-only mode and stops calling upstream entirely. It never returns
//! an error for well-formed text.

use async_trait::async_trait;
use council_application::ports::similarity::{SimilarityError, SimilarityMeasurer};
use council_domain::term_frequency_cosine;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{info, warn};

/// Consecutive upstream failures tolerated before latching into lexical mode
const DEFAULT_DEGRADE_AFTER: u32 = 3;

/// Upstream embedding service scoring a text pair
///
/// This is the fallible boundary the resilient measurer wraps; concrete
/// implementations own the embedding wire protocol.
#[async_trait]
pub trait EmbeddingScorer: Send + Sync {
    async fn score(
        &self,
        text1: &str,
        text2: &str,
        model: Option<&str>,
    ) -> Result<f64, SimilarityError>;
}

/// Measurer that survives upstream embedding failures
pub struct ResilientSimilarityMeasurer {
    scorer: Arc<dyn EmbeddingScorer>,
    consecutive_failures: AtomicU32,
    degraded: AtomicBool,
    degrade_after: u32,
}

impl ResilientSimilarityMeasurer {
    pub fn new(scorer: Arc<dyn EmbeddingScorer>) -> Self {
        Self {
            scorer,
            consecutive_failures: AtomicU32::new(0),
            degraded: AtomicBool::new(false),
            degrade_after: DEFAULT_DEGRADE_AFTER,
        }
    }

    /// Override how many consecutive failures trigger the latch
    pub fn with_degrade_after(mut self, degrade_after: u32) -> Self {
        self.degrade_after = degrade_after.max(1);
        self
    }

    /// Whether the measurer has latched into lexical-only mode
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimilarityMeasurer for ResilientSimilarityMeasurer {
    async fn calculate_text_similarity(
        &self,
        text1: &str,
        text2: &str,
        model: Option<&str>,
    ) -> Result<f64, SimilarityError> {
        if self.is_degraded() {
            return Ok(term_frequency_cosine(text1, text2));
        }

        match self.scorer.score(text1, text2, model).await {
            Ok(score) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                Ok(score.clamp(0.0, 1.0))
            }
            Err(error) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    failures,
                    error = %error,
                    "embedding score failed; using lexical similarity for this pair"
                );
                if failures >= self.degrade_after {
                    self.degraded.store(true, Ordering::SeqCst);
                    info!(
                        "similarity measurer degraded to lexical mode after {} consecutive failures",
                        failures
                    );
                }
                Ok(term_frequency_cosine(text1, text2))
            }
        }
    }
}

/// Measurer that is the lexical algorithm itself
///
/// Used by the offline `simulate` path and anywhere no embedding service is
/// available.
pub struct LexicalSimilarity;

#[async_trait]
impl SimilarityMeasurer for LexicalSimilarity {
    async fn calculate_text_similarity(
        &self,
        text1: &str,
        text2: &str,
        _model: Option<&str>,
    ) -> Result<f64, SimilarityError> {
        Ok(term_frequency_cosine(text1, text2))
    }
}

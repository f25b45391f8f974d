//! Historical negotiation exemplars
//!
//! Exemplars of past deliberations that reached consensus; injected into
//! reconsideration prompts to bias members toward convergent behavior.
//! Retrieval is owned by the external example source.

use serde::{Deserialize, Serialize};

/// One resolved historical disagreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationExample {
    /// Topic category (e.g. "architecture", "factual")
    pub category: String,
    /// Short description of the original query context
    pub query_context: String,
    /// What the members disagreed on
    pub disagreement: String,
    /// How the disagreement was resolved
    pub resolution: String,
    /// Rounds the negotiation took
    pub rounds_to_consensus: usize,
    /// Final mean pairwise similarity
    pub final_similarity: f64,
}

impl NegotiationExample {
    pub fn new(
        category: impl Into<String>,
        query_context: impl Into<String>,
        disagreement: impl Into<String>,
        resolution: impl Into<String>,
        rounds_to_consensus: usize,
        final_similarity: f64,
    ) -> Self {
        Self {
            category: category.into(),
            query_context: query_context.into(),
            disagreement: disagreement.into(),
            resolution: resolution.into(),
            rounds_to_consensus,
            final_similarity: final_similarity.clamp(0.0, 1.0),
        }
    }
}

//! Iterative consensus configuration
//!
//! [`IterativeConsensusConfig`] is supplied wholesale per deliberation and
//! never mutated by the core loop.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a round's provider calls are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationMode {
    /// All active members are called concurrently
    #[default]
    Parallel,
    /// Members are called one at a time in shuffled order
    Sequential,
}

impl std::fmt::Display for NegotiationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NegotiationMode::Parallel => write!(f, "parallel"),
            NegotiationMode::Sequential => write!(f, "sequential"),
        }
    }
}

impl std::str::FromStr for NegotiationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parallel" => Ok(NegotiationMode::Parallel),
            "sequential" => Ok(NegotiationMode::Sequential),
            _ => Err(format!(
                "Unknown negotiation mode: {}. Valid: parallel, sequential",
                s
            )),
        }
    }
}

/// Strategy for selecting or merging the representative response
///
/// Used both as the extraction rule on the consensus path and as the
/// synthesis algorithm when negotiation does not converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackStrategy {
    /// Pick the response most similar to all others
    #[default]
    ConsensusExtraction,
    /// Merge all perspectives into one document, led by the most central
    MetaSynthesis,
    /// Centrality-weighted lead answer with appended divergent points
    WeightedFusion,
}

impl FallbackStrategy {
    /// Get a human-readable description of this strategy
    pub fn description(&self) -> &'static str {
        match self {
            FallbackStrategy::ConsensusExtraction => {
                "consensus extraction (most central response wins)"
            }
            FallbackStrategy::MetaSynthesis => "meta synthesis (merged perspectives)",
            FallbackStrategy::WeightedFusion => "weighted fusion (centrality-weighted merge)",
        }
    }
}

impl std::fmt::Display for FallbackStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackStrategy::ConsensusExtraction => write!(f, "consensus-extraction"),
            FallbackStrategy::MetaSynthesis => write!(f, "meta-synthesis"),
            FallbackStrategy::WeightedFusion => write!(f, "weighted-fusion"),
        }
    }
}

impl std::str::FromStr for FallbackStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consensus-extraction" | "consensus_extraction" => {
                Ok(FallbackStrategy::ConsensusExtraction)
            }
            "meta-synthesis" | "meta_synthesis" => Ok(FallbackStrategy::MetaSynthesis),
            "weighted-fusion" | "weighted_fusion" => Ok(FallbackStrategy::WeightedFusion),
            _ => Err(format!(
                "Unknown fallback strategy: {}. Valid: consensus-extraction, meta-synthesis, weighted-fusion",
                s
            )),
        }
    }
}

/// Parameters controlling one deliberation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterativeConsensusConfig {
    /// Maximum negotiation rounds after Round 0
    pub max_rounds: usize,
    /// Mean pairwise similarity at which consensus is declared
    pub agreement_threshold: f64,
    /// Whether the stricter early-termination threshold is checked first
    pub early_termination_enabled: bool,
    /// Similarity at which negotiation stops before `agreement_threshold`
    /// would require more rounds
    pub early_termination_threshold: f64,
    /// Parallel or sequential dispatch within a round
    pub negotiation_mode: NegotiationMode,
    /// Upper bound on any member's call, regardless of member timeout
    pub per_round_timeout: Duration,
    /// Representative-response selection rule
    pub fallback_strategy: FallbackStrategy,
    /// Whether confirmed deadlock queues a human escalation
    pub human_escalation_enabled: bool,
    /// Historical exemplars injected into reconsideration prompts
    pub example_count: usize,
    /// Seed for the sequential-mode shuffle; None uses OS entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub randomization_seed: Option<u64>,
    /// Embedding model requested from the similarity measurer
    pub embedding_model: String,
}

impl Default for IterativeConsensusConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            agreement_threshold: 0.85,
            early_termination_enabled: true,
            early_termination_threshold: 0.95,
            negotiation_mode: NegotiationMode::Parallel,
            per_round_timeout: Duration::from_secs(60),
            fallback_strategy: FallbackStrategy::ConsensusExtraction,
            human_escalation_enabled: false,
            example_count: 3,
            randomization_seed: None,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

impl IterativeConsensusConfig {
    // ==================== Builder Methods ====================

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_agreement_threshold(mut self, threshold: f64) -> Self {
        self.agreement_threshold = threshold;
        self
    }

    pub fn with_early_termination(mut self, enabled: bool, threshold: f64) -> Self {
        self.early_termination_enabled = enabled;
        self.early_termination_threshold = threshold;
        self
    }

    pub fn with_negotiation_mode(mut self, mode: NegotiationMode) -> Self {
        self.negotiation_mode = mode;
        self
    }

    pub fn with_per_round_timeout(mut self, timeout: Duration) -> Self {
        self.per_round_timeout = timeout;
        self
    }

    pub fn with_fallback_strategy(mut self, strategy: FallbackStrategy) -> Self {
        self.fallback_strategy = strategy;
        self
    }

    pub fn with_human_escalation(mut self, enabled: bool) -> Self {
        self.human_escalation_enabled = enabled;
        self
    }

    pub fn with_example_count(mut self, count: usize) -> Self {
        self.example_count = count;
        self
    }

    pub fn with_randomization_seed(mut self, seed: u64) -> Self {
        self.randomization_seed = Some(seed);
        self
    }

    // ==================== Validation ====================

    /// Check threshold bounds and round limits
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_rounds == 0 {
            return Err(DomainError::InvalidConfig(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("agreement_threshold", self.agreement_threshold),
            (
                "early_termination_threshold",
                self.early_termination_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

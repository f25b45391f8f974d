//! Consensus decision types
//!
//! The immutable output of one deliberation, whether negotiation converged
//! or the offline fallback produced the answer.

use crate::config::FallbackStrategy;
use crate::core::current_timestamp;
use serde::{Deserialize, Serialize};

/// Confidence band derived from the measured agreement level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Map an agreement level to a confidence band
    ///
    /// >= 0.9 is high, >= 0.7 medium, anything lower is low.
    pub fn from_agreement(agreement_level: f64) -> Self {
        if agreement_level >= 0.9 {
            Confidence::High
        } else if agreement_level >= 0.7 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Confidence::High)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// Why negotiation handed over to the offline fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Fewer than 2 members remained able to negotiate
    InsufficientActiveMembers,
    /// Similarity stalled or reversed through the final rounds
    DeadlockDetected,
    /// The round budget ran out before the agreement threshold
    MaxRoundsReached,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::InsufficientActiveMembers => write!(f, "Insufficient active members"),
            FallbackReason::DeadlockDetected => write!(f, "Deadlock detected"),
            FallbackReason::MaxRoundsReached => write!(f, "Maximum rounds reached"),
        }
    }
}

/// How the deliberation concluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterativeConsensusMetadata {
    /// Whether the agreement threshold was reached online
    pub consensus_achieved: bool,
    /// Negotiation rounds actually executed (0..=max_rounds)
    pub total_rounds: usize,
    /// Whether the offline fallback produced the content
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

impl IterativeConsensusMetadata {
    /// Metadata for a negotiated consensus
    pub fn consensus(total_rounds: usize) -> Self {
        Self {
            consensus_achieved: true,
            total_rounds,
            fallback_used: false,
            fallback_reason: None,
        }
    }

    /// Metadata for a fallback decision
    pub fn fallback(total_rounds: usize, reason: FallbackReason) -> Self {
        Self {
            consensus_achieved: false,
            total_rounds,
            fallback_used: true,
            fallback_reason: Some(reason),
        }
    }
}

/// The council's final answer with its measured confidence
///
/// Immutable once produced. Exactly one decision exists per deliberation
/// unless fallback synthesis itself fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusDecision {
    /// The answer text
    pub content: String,
    /// Confidence band derived from `agreement_level`
    pub confidence: Confidence,
    /// Mean pairwise similarity at termination
    pub agreement_level: f64,
    /// Extraction rule that selected or merged the content
    pub synthesis_strategy: FallbackStrategy,
    /// Members whose answers fed the final content
    pub contributing_members: Vec<String>,
    /// Milliseconds since epoch
    pub timestamp: u64,
    pub metadata: IterativeConsensusMetadata,
}

impl ConsensusDecision {
    /// Build a negotiated-consensus decision
    pub fn consensus(
        content: impl Into<String>,
        agreement_level: f64,
        synthesis_strategy: FallbackStrategy,
        contributing_members: Vec<String>,
        total_rounds: usize,
    ) -> Self {
        Self {
            content: content.into(),
            confidence: Confidence::from_agreement(agreement_level),
            agreement_level,
            synthesis_strategy,
            contributing_members,
            timestamp: current_timestamp(),
            metadata: IterativeConsensusMetadata::consensus(total_rounds),
        }
    }

    /// Build a fallback decision
    pub fn fallback(
        content: impl Into<String>,
        agreement_level: f64,
        synthesis_strategy: FallbackStrategy,
        contributing_members: Vec<String>,
        total_rounds: usize,
        reason: FallbackReason,
    ) -> Self {
        Self {
            content: content.into(),
            confidence: Confidence::from_agreement(agreement_level),
            agreement_level,
            synthesis_strategy,
            contributing_members,
            timestamp: current_timestamp(),
            metadata: IterativeConsensusMetadata::fallback(total_rounds, reason),
        }
    }
}

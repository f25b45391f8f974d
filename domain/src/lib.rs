//! Domain layer for model-council
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Council
//!
//! A council is a set of independent model backends ("members") that answer
//! the same question. Members first answer independently (Round 0), then
//! negotiate over further rounds until their answers converge.
//!
//! ## Convergence
//!
//! Convergence is measured as the average pairwise similarity of the active
//! members' latest answers. The pure analysis of a similarity history
//! (trend, velocity, deadlock, rounds-to-consensus) lives in
//! [`consensus::convergence`].
//!
//! ## Decision
//!
//! Every deliberation ends in exactly one [`ConsensusDecision`], either a
//! negotiated consensus or a deterministic offline fallback, carrying the
//! measured agreement level and a confidence derived from it.

pub mod config;
pub mod consensus;
pub mod core;
pub mod example;
pub mod member;
pub mod thread;

// Re-export commonly used types
pub use config::{FallbackStrategy, IterativeConsensusConfig, NegotiationMode};
pub use consensus::{
    Confidence, ConsensusDecision, ConvergenceTrend, DeadlockRisk, FallbackReason,
    IterativeConsensusMetadata, ResponseCandidate, SimilarityHistory, TrendDirection,
    analyze_trend, calculate_velocity, extract_representative, is_deadlocked,
    is_deadlocked_with_window, predict_rounds_to_consensus, term_frequency_cosine,
};
pub use crate::core::{error::DomainError, request::UserRequest};
pub use example::NegotiationExample;
pub use member::{CouncilMember, RetryPolicy};
pub use thread::{DeliberationThread, Exchange, Round, TokenUsage};

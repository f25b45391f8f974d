//! Consensus domain
//!
//! Everything needed to decide whether a negotiation has converged and what
//! the council's answer is:
//!
//! - [`convergence`]: pure analysis of a similarity history (velocity,
//!   deadlock, trend, projected rounds-to-consensus)
//! - [`history`]: the append-only per-round similarity record
//! - [`lexical`]: deterministic term-frequency cosine similarity, the
//!   degraded mode of semantic measurement and the offline metric of
//!   fallback synthesis
//! - [`extraction`]: representative-response selection per strategy
//! - [`decision`]: the immutable [`ConsensusDecision`] output

pub mod convergence;
pub mod decision;
pub mod extraction;
pub mod history;
pub mod lexical;

// Re-export main types
pub use convergence::{
    ConvergenceTrend, DeadlockRisk, TrendDirection, analyze_trend, calculate_velocity,
    is_deadlocked, is_deadlocked_with_window, predict_rounds_to_consensus,
};
pub use decision::{Confidence, ConsensusDecision, FallbackReason, IterativeConsensusMetadata};
pub use extraction::{ResponseCandidate, extract_representative};
pub use history::SimilarityHistory;
pub use lexical::term_frequency_cosine;

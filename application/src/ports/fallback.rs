//! Fallback synthesizer port
//!
//! Deterministic, offline synthesis over already-collected thread text with
//! no provider calls. This is the only collaborator whose failure is fatal
//! to a deliberation: without it, no decision can be produced at all.

use council_domain::{DeliberationThread, IterativeConsensusConfig};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("no responses available for synthesis")]
    EmptyThread,

    #[error("fallback synthesis failed: {0}")]
    Synthesis(String),
}

/// Result of offline synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    pub content: String,
    pub contributing_members: Vec<String>,
    /// Offline agreement estimate over the synthesized inputs, in [0, 1]
    pub agreement_level: f64,
}

pub trait FallbackSynthesizer: Send + Sync {
    /// Synthesize a decision from the thread per the configured strategy
    fn synthesize(
        &self,
        thread: &DeliberationThread,
        config: &IterativeConsensusConfig,
    ) -> Result<FallbackOutcome, FallbackError>;
}

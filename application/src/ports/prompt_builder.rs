//! Prompt builder port
//!
//! Builds the next-round reconsideration prompt for one member from the
//! prior round's exchanges, the member's own previous answer, optional
//! historical exemplars, and the original query. Pure given its inputs.

use council_domain::{Exchange, NegotiationExample};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PromptError {
    #[error("prompt assembly failed: {0}")]
    Assembly(String),
}

pub trait PromptBuilder: Send + Sync {
    /// Build one member's reconsideration prompt
    ///
    /// `prior_exchanges` are the peers' contributions from the previous
    /// round (the member's own is passed separately as `own_previous`).
    fn build(
        &self,
        prior_exchanges: &[Exchange],
        own_previous: Option<&str>,
        examples: &[NegotiationExample],
        query: &str,
    ) -> Result<String, PromptError>;
}

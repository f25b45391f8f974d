//! Example source port
//!
//! Retrieves historical exemplars of resolved disagreements to bias
//! reconsideration prompts. Retrieval failure is never fatal; the loop
//! simply proceeds without exemplars.

use async_trait::async_trait;
use council_domain::NegotiationExample;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ExampleSourceError {
    #[error("example retrieval failed: {0}")]
    Retrieval(String),
}

#[async_trait]
pub trait ExampleSource: Send + Sync {
    /// Up to `count` exemplars relevant to `query`
    async fn relevant_examples(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<NegotiationExample>, ExampleSourceError>;
}

/// No-op source for when no example corpus is wired
pub struct NoExamples;

#[async_trait]
impl ExampleSource for NoExamples {
    async fn relevant_examples(
        &self,
        _query: &str,
        _count: usize,
    ) -> Result<Vec<NegotiationExample>, ExampleSourceError> {
        Ok(Vec::new())
    }
}

//! Provider gateway port
//!
//! Defines the capability interface for sending one prompt to one council
//! member. Concrete provider adapters live in the infrastructure layer; the
//! orchestrator depends only on this trait.
//!
//! Failures come back as structured [`ProviderError`] values rather than
//! panics so the negotiation loop can branch on them directly.

use async_trait::async_trait;
use council_domain::{CouncilMember, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Machine-branchable failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    /// The effective timeout elapsed before the provider answered
    Timeout,
    /// The provider rejected the call for rate or quota reasons
    RateLimited,
    /// The provider or its adapter is not reachable
    Unavailable,
    /// The provider answered with something the adapter could not use
    InvalidResponse,
    /// The provider refused the prompt
    Rejected,
    Unknown,
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ProviderErrorCode::Timeout => "timeout",
            ProviderErrorCode::RateLimited => "rate_limited",
            ProviderErrorCode::Unavailable => "unavailable",
            ProviderErrorCode::InvalidResponse => "invalid_response",
            ProviderErrorCode::Rejected => "rejected",
            ProviderErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", code)
    }
}

/// Structured provider failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
    /// Whether an adapter-level retry could plausibly succeed
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }

    /// Timeout after waiting out the effective per-call budget
    pub fn timeout(waited: Duration) -> Self {
        Self::new(
            ProviderErrorCode::Timeout,
            format!("no response within {}ms", waited.as_millis()),
            true,
        )
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Unavailable, message, false)
    }
}

/// Successful provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    pub content: String,
    pub token_usage: TokenUsage,
    pub latency: Duration,
}

impl ProviderReply {
    pub fn new(content: impl Into<String>, token_usage: TokenUsage, latency: Duration) -> Self {
        Self {
            content: content.into(),
            token_usage,
            latency,
        }
    }
}

/// Reported health of a member's provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Capability interface over concrete provider adapters
///
/// Adapters own wire protocols, authentication, and retry of retryable
/// errors per the member's [`RetryPolicy`](council_domain::RetryPolicy); a
/// returned `Err` is final for the round.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Send one prompt to one member and wait for its settled outcome
    async fn send_request(
        &self,
        member: &CouncilMember,
        prompt: &str,
    ) -> Result<ProviderReply, ProviderError>;

    /// Current health of the member's provider
    async fn get_health(&self, _member: &CouncilMember) -> ProviderHealth {
        ProviderHealth::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ProviderError::new(ProviderErrorCode::RateLimited, "429 from upstream", true);
        assert_eq!(error.to_string(), "rate_limited: 429 from upstream");
        assert!(error.retryable);
    }

    #[test]
    fn test_timeout_constructor() {
        let error = ProviderError::timeout(Duration::from_millis(1500));
        assert_eq!(error.code, ProviderErrorCode::Timeout);
        assert!(error.message.contains("1500ms"));
        assert!(error.retryable);
    }
}

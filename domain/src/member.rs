//! Council member identity and per-member call policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry guidance for provider adapters
///
/// Adapters retry retryable errors up to `max_attempts` within the member's
/// timeout; the orchestrator itself never retries, and a settled failure
/// drops the member from the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the first retry; adapters may grow it per attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// One configured model backend participating in deliberation (Value Object)
///
/// Immutable, loaded from configuration. `provider` selects the adapter,
/// `model` the backend model identifier within that provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilMember {
    /// Stable member identifier, unique within a council
    pub id: String,
    /// Provider name routed to an adapter (e.g. "anthropic", "openai")
    pub provider: String,
    /// Model identifier understood by the provider
    pub model: String,
    /// Per-call timeout for this member
    pub timeout: Duration,
    /// Retry guidance for the provider adapter
    pub retry_policy: RetryPolicy,
}

impl CouncilMember {
    /// Create a member with the default timeout and retry policy
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            model: model.into(),
            timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Get a short display name for the member
    ///
    /// E.g., "claude-sonnet" -> "claude"
    pub fn short_name(&self) -> &str {
        self.id.split(['-', '_']).next().unwrap_or(&self.id)
    }
}

impl std::fmt::Display for CouncilMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}/{})", self.id, self.provider, self.model)
    }
}

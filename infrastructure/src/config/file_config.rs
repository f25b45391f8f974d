//! File configuration schema
//!
//! TOML-facing representation of the council roster and consensus
//! parameters, with conversions into the domain types. Durations are
//! expressed in milliseconds at the file level.

use council_domain::{
    CouncilMember, DomainError, FallbackStrategy, IterativeConsensusConfig, NegotiationMode,
    RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while turning file values into domain config
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub council: CouncilSection,
    pub consensus: ConsensusSection,
    pub logging: LoggingSection,
}

/// `[council]` - the member roster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CouncilSection {
    pub members: Vec<MemberEntry>,
}

/// `[[council.members]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberEntry {
    pub id: String,
    pub provider: String,
    pub model: String,
    pub timeout_ms: u64,
    pub retry: RetryEntry,
}

impl Default for MemberEntry {
    fn default() -> Self {
        Self {
            id: String::new(),
            provider: String::new(),
            model: String::new(),
            timeout_ms: 30_000,
            retry: RetryEntry::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryEntry {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryEntry {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff_ms: 500,
        }
    }
}

/// `[consensus]` - negotiation loop parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSection {
    pub max_rounds: usize,
    pub agreement_threshold: f64,
    pub early_termination_enabled: bool,
    pub early_termination_threshold: f64,
    pub negotiation_mode: String,
    pub per_round_timeout_ms: u64,
    pub fallback_strategy: String,
    pub human_escalation_enabled: bool,
    pub example_count: usize,
    pub randomization_seed: Option<u64>,
    pub embedding_model: String,
}

impl Default for ConsensusSection {
    fn default() -> Self {
        let defaults = IterativeConsensusConfig::default();
        Self {
            max_rounds: defaults.max_rounds,
            agreement_threshold: defaults.agreement_threshold,
            early_termination_enabled: defaults.early_termination_enabled,
            early_termination_threshold: defaults.early_termination_threshold,
            negotiation_mode: defaults.negotiation_mode.to_string(),
            per_round_timeout_ms: defaults.per_round_timeout.as_millis() as u64,
            fallback_strategy: defaults.fallback_strategy.to_string(),
            human_escalation_enabled: defaults.human_escalation_enabled,
            example_count: defaults.example_count,
            randomization_seed: defaults.randomization_seed,
            embedding_model: defaults.embedding_model,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// JSONL audit log path; auditing is off when unset
    pub event_log: Option<PathBuf>,
}

impl FileConfig {
    /// Build the council roster from the `[council]` section
    pub fn members(&self) -> Result<Vec<CouncilMember>, ConfigError> {
        self.council
            .members
            .iter()
            .map(|entry| {
                if entry.id.trim().is_empty() {
                    return Err(ConfigError::InvalidField {
                        field: "council.members.id",
                        message: "member id cannot be empty".to_string(),
                    });
                }
                Ok(
                    CouncilMember::new(&entry.id, &entry.provider, &entry.model)
                        .with_timeout(Duration::from_millis(entry.timeout_ms))
                        .with_retry_policy(RetryPolicy {
                            max_attempts: entry.retry.max_attempts,
                            initial_backoff: Duration::from_millis(entry.retry.initial_backoff_ms),
                        }),
                )
            })
            .collect()
    }

    /// Build the validated domain config from the `[consensus]` section
    pub fn consensus(&self) -> Result<IterativeConsensusConfig, ConfigError> {
        let negotiation_mode: NegotiationMode = self
            .consensus
            .negotiation_mode
            .parse()
            .map_err(|message| ConfigError::InvalidField {
                field: "consensus.negotiation_mode",
                message,
            })?;
        let fallback_strategy: FallbackStrategy = self
            .consensus
            .fallback_strategy
            .parse()
            .map_err(|message| ConfigError::InvalidField {
                field: "consensus.fallback_strategy",
                message,
            })?;

        let config = IterativeConsensusConfig {
            max_rounds: self.consensus.max_rounds,
            agreement_threshold: self.consensus.agreement_threshold,
            early_termination_enabled: self.consensus.early_termination_enabled,
            early_termination_threshold: self.consensus.early_termination_threshold,
            negotiation_mode,
            per_round_timeout: Duration::from_millis(self.consensus.per_round_timeout_ms),
            fallback_strategy,
            human_escalation_enabled: self.consensus.human_escalation_enabled,
            example_count: self.consensus.example_count,
            randomization_seed: self.consensus.randomization_seed,
            embedding_model: self.consensus.embedding_model.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

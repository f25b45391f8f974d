//! Infrastructure layer for model-council
//!
//! Adapters implementing the application ports: resilient similarity
//! measurement, prompt building, offline fallback synthesis, JSONL audit
//! logging, escalation queuing, file configuration, and provider routing.

pub mod config;
pub mod escalation;
pub mod fallback;
pub mod logging;
pub mod prompt;
pub mod providers;
pub mod similarity;

pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use escalation::{EscalationTicket, QueuedEscalationService};
pub use fallback::OfflineFallbackSynthesizer;
pub use logging::JsonlEventSink;
pub use prompt::ReconsiderationPromptBuilder;
pub use providers::{RoutingGateway, ScriptedGateway};
pub use similarity::{EmbeddingScorer, LexicalSimilarity, ResilientSimilarityMeasurer};

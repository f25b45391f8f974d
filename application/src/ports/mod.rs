//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.
//! Every port ships a no-op implementation for tests and for deployments
//! that do not wire the concern.

pub mod escalation;
pub mod event_sink;
pub mod example_source;
pub mod fallback;
pub mod prompt_builder;
pub mod provider_gateway;
pub mod similarity;

pub use escalation::{EscalationService, NoEscalation};
pub use event_sink::{EventSink, NoEventSink};
pub use example_source::{ExampleSource, ExampleSourceError, NoExamples};
pub use fallback::{FallbackError, FallbackOutcome, FallbackSynthesizer};
pub use prompt_builder::{PromptBuilder, PromptError};
pub use provider_gateway::{
    ProviderError, ProviderErrorCode, ProviderGateway, ProviderHealth, ProviderReply,
};
pub use similarity::{SimilarityError, SimilarityMeasurer};

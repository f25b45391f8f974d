//! Application layer for model-council
//!
//! Ports (interfaces for external collaborators) and the negotiation use
//! case that drives the bounded multi-round consensus loop.

pub mod ports;
pub mod use_cases;

pub use use_cases::negotiate::{
    NegotiateError, NegotiateUseCase, NegotiationInput, NegotiationOutcome,
};

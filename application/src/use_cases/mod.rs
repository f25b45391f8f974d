//! Use cases

pub mod negotiate;

pub use negotiate::{NegotiateError, NegotiateUseCase, NegotiationInput, NegotiationOutcome};

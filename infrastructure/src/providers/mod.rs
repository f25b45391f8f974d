//! Provider adapters
//!
//! Concrete per-provider API adapters are external to this repository; what
//! lives here is the capability-interface plumbing: [`RoutingGateway`]
//! dispatches each member to the adapter registered for its provider name,
//! and [`ScriptedGateway`] is the deterministic adapter used by the offline
//! `simulate` command and integration tests.

pub mod routing;
pub mod scripted;

pub use routing::RoutingGateway;
pub use scripted::ScriptedGateway;

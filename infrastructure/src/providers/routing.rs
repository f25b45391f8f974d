//! Provider routing gateway
//!
//! Composite [`ProviderGateway`] that dispatches each member to the adapter
//! registered for its provider name. The orchestrator only ever sees the
//! capability interface; adapters plug in here.

use async_trait::async_trait;
use council_application::ports::provider_gateway::{
    ProviderError, ProviderErrorCode, ProviderGateway, ProviderHealth, ProviderReply,
};
use council_domain::CouncilMember;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes members to registered provider adapters by provider name
#[derive(Default)]
pub struct RoutingGateway {
    adapters: HashMap<String, Arc<dyn ProviderGateway>>,
}

impl RoutingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for a provider name
    pub fn register(mut self, provider: impl Into<String>, adapter: Arc<dyn ProviderGateway>) -> Self {
        self.adapters.insert(provider.into(), adapter);
        self
    }

    fn resolve(&self, member: &CouncilMember) -> Result<&Arc<dyn ProviderGateway>, ProviderError> {
        self.adapters.get(&member.provider).ok_or_else(|| {
            ProviderError::new(
                ProviderErrorCode::Unavailable,
                format!("no adapter registered for provider '{}'", member.provider),
                false,
            )
        })
    }
}

#[async_trait]
impl ProviderGateway for RoutingGateway {
    async fn send_request(
        &self,
        member: &CouncilMember,
        prompt: &str,
    ) -> Result<ProviderReply, ProviderError> {
        self.resolve(member)?.send_request(member, prompt).await
    }

    async fn get_health(&self, member: &CouncilMember) -> ProviderHealth {
        match self.resolve(member) {
            Ok(adapter) => adapter.get_health(member).await,
            Err(_) => ProviderHealth::Unhealthy,
        }
    }
}

//! Scripted provider adapter
//!
//! Replays pre-written responses per member, one per negotiation round, in
//! order. Used by the offline `simulate` command and integration tests;
//! an exhausted script surfaces as a structured failure, which exercises the
//! orchestrator's member-drop path deterministically.

use async_trait::async_trait;
use council_application::ports::provider_gateway::{
    ProviderError, ProviderErrorCode, ProviderGateway, ProviderHealth, ProviderReply,
};
use council_domain::{CouncilMember, TokenUsage};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Gateway that answers from per-member scripts
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<String, VecDeque<String>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append scripted replies for a member, consumed in order
    pub fn script(self, member_id: impl Into<String>, replies: Vec<String>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts
                .entry(member_id.into())
                .or_default()
                .extend(replies);
        }
        self
    }

    /// Remaining scripted replies for a member
    pub fn remaining(&self, member_id: &str) -> usize {
        self.scripts
            .lock()
            .map(|scripts| scripts.get(member_id).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    /// Rough token estimate so scripted runs produce plausible accounting
    fn estimate_tokens(prompt: &str, reply: &str) -> TokenUsage {
        TokenUsage::new(
            prompt.split_whitespace().count() as u32,
            reply.split_whitespace().count() as u32,
        )
    }
}

#[async_trait]
impl ProviderGateway for ScriptedGateway {
    async fn send_request(
        &self,
        member: &CouncilMember,
        prompt: &str,
    ) -> Result<ProviderReply, ProviderError> {
        let reply = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.get_mut(&member.id)?.pop_front());

        match reply {
            Some(content) => {
                let token_usage = Self::estimate_tokens(prompt, &content);
                Ok(ProviderReply::new(content, token_usage, Duration::ZERO))
            }
            None => Err(ProviderError::new(
                ProviderErrorCode::Unavailable,
                format!("script exhausted for member '{}'", member.id),
                false,
            )),
        }
    }

    async fn get_health(&self, member: &CouncilMember) -> ProviderHealth {
        if self.remaining(&member.id) > 0 {
            ProviderHealth::Healthy
        } else {
            ProviderHealth::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> CouncilMember {
        CouncilMember::new(id, "scripted", "scripted-v1")
    }

    #[tokio::test]
    async fn test_replies_are_consumed_in_order() {
        let gateway = ScriptedGateway::new()
            .script("a", vec!["first".to_string(), "second".to_string()]);

        let reply = gateway.send_request(&member("a"), "p1 p2").await.unwrap();
        assert_eq!(reply.content, "first");
        assert_eq!(reply.token_usage.prompt_tokens, 2);

        let reply = gateway.send_request(&member("a"), "p").await.unwrap();
        assert_eq!(reply.content, "second");
        assert_eq!(gateway.remaining("a"), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_structured_failure() {
        let gateway = ScriptedGateway::new().script("a", vec!["only".to_string()]);
        gateway.send_request(&member("a"), "p").await.unwrap();

        let error = gateway.send_request(&member("a"), "p").await.unwrap_err();
        assert_eq!(error.code, ProviderErrorCode::Unavailable);
        assert!(!error.retryable);

        // An unscripted member fails the same way.
        let error = gateway.send_request(&member("ghost"), "p").await.unwrap_err();
        assert!(error.message.contains("ghost"));
    }

    #[tokio::test]
    async fn test_health_tracks_remaining_script() {
        let gateway = ScriptedGateway::new().script("a", vec!["x".to_string()]);
        assert_eq!(gateway.get_health(&member("a")).await, ProviderHealth::Healthy);
        gateway.send_request(&member("a"), "p").await.unwrap();
        assert_eq!(
            gateway.get_health(&member("a")).await,
            ProviderHealth::Unhealthy
        );
    }
}

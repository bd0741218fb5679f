//! Push channel adapter.
//!
//! Resolves the recipient's device tokens, fans out one provider call per
//! token, and treats the channel as delivered when at least one token
//! succeeds. Tokens the provider reports as permanently invalid are pruned
//! from the token store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;

use super::{ChannelAdapter, ChannelMessage, ProviderResponse};
use crate::notification::{Channel, ChannelResult};

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 1000;

/// External push provider contract (device-token based).
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send_push(&self, token: &str, push: &PushMessage) -> PushDelivery;
}

/// Message shape handed to the push provider
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Per-token outcome reported by the push provider
#[derive(Debug, Clone)]
pub struct PushDelivery {
    pub response: ProviderResponse,
    /// The provider reported the token as permanently unusable
    pub invalid_token: bool,
}

impl PushDelivery {
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            response: ProviderResponse::ok(message_id),
            invalid_token: false,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            response: ProviderResponse::failed(error),
            invalid_token: false,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            response: ProviderResponse::failed(error),
            invalid_token: true,
        }
    }
}

/// Device token storage contract.
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    async fn tokens_for(&self, user_id: &str) -> Vec<String>;

    /// Remove a token for a user. Removing an absent token is a no-op.
    async fn remove(&self, user_id: &str, token: &str);
}

/// In-memory device token store.
#[derive(Default)]
pub struct MemoryDeviceTokenStore {
    tokens: DashMap<String, Vec<String>>,
}

impl MemoryDeviceTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user_id: &str, token: impl Into<String>) {
        let token = token.into();
        let mut entry = self.tokens.entry(user_id.to_string()).or_default();
        if !entry.contains(&token) {
            entry.push(token);
        }
    }
}

#[async_trait]
impl DeviceTokenStore for MemoryDeviceTokenStore {
    async fn tokens_for(&self, user_id: &str) -> Vec<String> {
        self.tokens
            .get(user_id)
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    async fn remove(&self, user_id: &str, token: &str) {
        if let Some(mut entry) = self.tokens.get_mut(user_id) {
            entry.retain(|t| t != token);
        }
    }
}

/// Push notification adapter.
pub struct PushAdapter {
    provider: Arc<dyn PushProvider>,
    tokens: Arc<dyn DeviceTokenStore>,
}

impl PushAdapter {
    pub fn new(provider: Arc<dyn PushProvider>, tokens: Arc<dyn DeviceTokenStore>) -> Self {
        Self { provider, tokens }
    }

    fn build_message(&self, message: &ChannelMessage) -> Result<PushMessage, String> {
        if message.title.chars().count() > MAX_TITLE_LEN {
            return Err(format!(
                "push title exceeds {} characters",
                MAX_TITLE_LEN
            ));
        }
        if message.body.chars().count() > MAX_BODY_LEN {
            return Err(format!("push body exceeds {} characters", MAX_BODY_LEN));
        }

        Ok(PushMessage {
            user_id: message.recipient_id.clone(),
            title: message.title.clone(),
            body: message.body.clone(),
            data: message.data.clone(),
        })
    }
}

#[async_trait]
impl ChannelAdapter for PushAdapter {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(&self, message: &ChannelMessage) -> ChannelResult {
        let push = match self.build_message(message) {
            Ok(push) => push,
            Err(error) => {
                tracing::debug!(
                    notification_id = %message.notification_id,
                    error = %error,
                    "Push payload validation failed"
                );
                return ChannelResult::failed(Channel::Push, error);
            }
        };

        let tokens = self.tokens.tokens_for(&message.recipient_id).await;
        if tokens.is_empty() {
            return ChannelResult::failed(Channel::Push, "no registered device tokens");
        }

        // Per-token fan-out; the channel succeeds when any token succeeds
        let sends = tokens.iter().map(|token| {
            let provider = self.provider.clone();
            let push = push.clone();
            async move {
                let delivery = provider.send_push(token, &push).await;
                (token.clone(), delivery)
            }
        });
        let deliveries = join_all(sends).await;

        let mut first_message_id = None;
        let mut errors = Vec::new();
        let mut delivered = 0;

        for (token, delivery) in deliveries {
            if delivery.invalid_token {
                tracing::info!(
                    user_id = %message.recipient_id,
                    "Pruning invalid device token"
                );
                self.tokens.remove(&message.recipient_id, &token).await;
            }

            if delivery.response.success {
                delivered += 1;
                if first_message_id.is_none() {
                    first_message_id = delivery.response.message_id;
                }
            } else if let Some(error) = delivery.response.error {
                errors.push(error);
            }
        }

        if delivered > 0 {
            tracing::debug!(
                notification_id = %message.notification_id,
                delivered = delivered,
                failed = errors.len(),
                "Push sent"
            );
            ChannelResult::ok(Channel::Push, first_message_id)
        } else {
            ChannelResult::failed(
                Channel::Push,
                format!("all device tokens failed: {}", errors.join("; ")),
            )
        }
    }
}

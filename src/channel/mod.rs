//! Channel adapters.
//!
//! This module provides the delivery transports the orchestrator fans out
//! to:
//! - Email (provider contract)
//! - SMS (gateway contract)
//! - Push (device-token based)
//! - Generic webhooks (HTTP POST)
//! - In-app inbox
//!
//! Every adapter converts transport failures into a failed
//! [`ChannelResult`]; nothing escapes the adapter boundary as an error.

mod email;
mod in_app;
mod push;
mod sms;
mod webhook;

pub use email::{EmailAdapter, EmailMessage, EmailProvider};
pub use in_app::{InAppAdapter, InAppConfig, InAppInbox, InAppMessage};
pub use push::{
    DeviceTokenStore, MemoryDeviceTokenStore, PushAdapter, PushDelivery, PushMessage, PushProvider,
};
pub use sms::{SmsAdapter, SmsMessage, SmsProvider};
pub use webhook::{WebhookAdapter, WebhookAuth, WebhookConfig};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::{Channel, ChannelResult, NotificationKind, Priority};

/// Channel-agnostic view of one dispatch attempt.
///
/// Each adapter derives its own transport-specific message shape from this
/// and validates the fields it needs before any transport call.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub notification_id: Uuid,
    pub kind: NotificationKind,
    pub recipient_id: String,
    pub recipient_email: Option<String>,
    pub recipient_phone: Option<String>,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub priority: Priority,
    pub metadata: HashMap<String, String>,
}

/// Uniform response of an external transport provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderResponse {
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Trait for channel adapters.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> Channel;

    /// Send one message through this channel.
    ///
    /// Failures are returned as data; this method never panics and never
    /// surfaces a transport error as anything but a failed result.
    async fn send(&self, message: &ChannelMessage) -> ChannelResult;
}

/// Registry mapping each channel to its adapter.
///
/// New channels register here without any orchestrator change.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the channel it reports.
    ///
    /// Registering a second adapter for the same channel replaces the first.
    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        let channel = adapter.channel();
        if self.adapters.insert(channel, adapter).is_some() {
            tracing::warn!(channel = %channel, "Replaced previously registered channel adapter");
        } else {
            tracing::info!(channel = %channel, "Registered channel adapter");
        }
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Minimal message for adapter unit tests
    pub fn message_for(recipient_id: &str) -> ChannelMessage {
        ChannelMessage {
            notification_id: Uuid::new_v4(),
            kind: NotificationKind::SystemAnnouncement,
            recipient_id: recipient_id.to_string(),
            recipient_email: None,
            recipient_phone: None,
            title: "Title".to_string(),
            body: "Body".to_string(),
            data: serde_json::Value::Null,
            priority: Priority::Normal,
            metadata: HashMap::new(),
        }
    }
}

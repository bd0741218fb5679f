//! In-app channel adapter.
//!
//! Delivers into a per-user bounded inbox that the application surface
//! reads back. Each user has a `VecDeque` acting as a circular buffer;
//! when the inbox is full the oldest message is dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChannelAdapter, ChannelMessage};
use crate::notification::{Channel, ChannelResult, NotificationKind};

/// Configuration for the in-app inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppConfig {
    /// Maximum number of messages retained per user
    #[serde(default = "default_max_inbox_size")]
    pub max_inbox_size: usize,
}

fn default_max_inbox_size() -> usize {
    100
}

impl Default for InAppConfig {
    fn default() -> Self {
        Self {
            max_inbox_size: default_max_inbox_size(),
        }
    }
}

/// A message waiting in a user's inbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InAppMessage {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Per-user in-app inbox.
pub struct InAppInbox {
    inboxes: DashMap<String, VecDeque<InAppMessage>>,
    config: InAppConfig,
}

impl InAppInbox {
    pub fn new(config: InAppConfig) -> Self {
        Self {
            inboxes: DashMap::new(),
            config,
        }
    }

    /// Append a message to a user's inbox, dropping the oldest when full.
    pub fn deliver(&self, user_id: &str, message: InAppMessage) {
        let mut inbox = self.inboxes.entry(user_id.to_string()).or_default();

        if inbox.len() >= self.config.max_inbox_size {
            if let Some(dropped) = inbox.pop_front() {
                tracing::debug!(
                    user_id = %user_id,
                    dropped_id = %dropped.id,
                    inbox_size = inbox.len(),
                    "Dropped oldest message from full inbox"
                );
            }
        }

        inbox.push_back(message);
    }

    /// Take all messages for a user, oldest first.
    pub fn drain(&self, user_id: &str) -> Vec<InAppMessage> {
        match self.inboxes.remove(user_id) {
            Some((_, inbox)) => inbox.into(),
            None => Vec::new(),
        }
    }

    /// Number of unread messages for a user
    pub fn unread_count(&self, user_id: &str) -> usize {
        self.inboxes.get(user_id).map(|i| i.len()).unwrap_or(0)
    }

    /// Number of users with at least one unread message
    pub fn users_with_messages(&self) -> usize {
        self.inboxes.len()
    }
}

/// In-app notification adapter.
pub struct InAppAdapter {
    inbox: Arc<InAppInbox>,
}

impl InAppAdapter {
    pub fn new(inbox: Arc<InAppInbox>) -> Self {
        Self { inbox }
    }
}

#[async_trait]
impl ChannelAdapter for InAppAdapter {
    fn channel(&self) -> Channel {
        Channel::InApp
    }

    async fn send(&self, message: &ChannelMessage) -> ChannelResult {
        let entry = InAppMessage {
            id: Uuid::new_v4(),
            notification_id: message.notification_id,
            kind: message.kind,
            title: message.title.clone(),
            body: message.body.clone(),
            data: message.data.clone(),
            received_at: Utc::now(),
        };
        let entry_id = entry.id;

        self.inbox.deliver(&message.recipient_id, entry);

        tracing::debug!(
            notification_id = %message.notification_id,
            user_id = %message.recipient_id,
            "Delivered to in-app inbox"
        );
        ChannelResult::ok(Channel::InApp, Some(entry_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::message_for;
    use super::*;

    fn inbox_with_capacity(max: usize) -> Arc<InAppInbox> {
        Arc::new(InAppInbox::new(InAppConfig {
            max_inbox_size: max,
        }))
    }

    #[tokio::test]
    async fn test_send_lands_in_inbox() {
        let inbox = inbox_with_capacity(10);
        let adapter = InAppAdapter::new(inbox.clone());

        let result = adapter.send(&message_for("user-1")).await;

        assert!(result.success);
        assert_eq!(inbox.unread_count("user-1"), 1);
    }

    #[tokio::test]
    async fn test_full_inbox_drops_oldest() {
        let inbox = inbox_with_capacity(3);
        let adapter = InAppAdapter::new(inbox.clone());

        for _ in 0..5 {
            adapter.send(&message_for("user-1")).await;
        }

        assert_eq!(inbox.unread_count("user-1"), 3);
    }

    #[tokio::test]
    async fn test_drain_empties_inbox() {
        let inbox = inbox_with_capacity(10);
        let adapter = InAppAdapter::new(inbox.clone());

        for _ in 0..3 {
            adapter.send(&message_for("user-1")).await;
        }

        let messages = inbox.drain("user-1");
        assert_eq!(messages.len(), 3);
        assert_eq!(inbox.unread_count("user-1"), 0);
        assert!(inbox.drain("user-1").is_empty());
    }

    #[test]
    fn test_multiple_users() {
        let inbox = inbox_with_capacity(10);
        inbox.deliver(
            "user-1",
            InAppMessage {
                id: Uuid::new_v4(),
                notification_id: Uuid::new_v4(),
                kind: NotificationKind::MessageReceived,
                title: "t".to_string(),
                body: "b".to_string(),
                data: serde_json::Value::Null,
                received_at: Utc::now(),
            },
        );

        assert_eq!(inbox.unread_count("user-1"), 1);
        assert_eq!(inbox.unread_count("user-2"), 0);
        assert_eq!(inbox.users_with_messages(), 1);
    }
}

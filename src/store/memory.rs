//! In-memory delivery record store using DashMap.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{DeliveryRecordStore, DeliveryStatistics, DeliveryUpdate};
use crate::error::{Error, Result};
use crate::notification::Notification;

/// In-memory delivery record store.
#[derive(Default)]
pub struct MemoryDeliveryStore {
    records: DashMap<Uuid, Notification>,
}

impl MemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DeliveryRecordStore for MemoryDeliveryStore {
    async fn create(&self, notification: Notification) -> Result<Uuid> {
        let id = notification.id;
        self.records.insert(id, notification);
        Ok(id)
    }

    async fn update(&self, id: Uuid, patch: DeliveryUpdate) -> Result<()> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| Error::Store(format!("unknown notification id: {}", id)))?;

        if let Some(status) = patch.status {
            if !record.status.can_transition_to(status) {
                return Err(Error::Store(format!(
                    "illegal status transition: {} -> {}",
                    record.status, status
                )));
            }
            record.status = status;
        }
        if let Some(delivered_at) = patch.delivered_at {
            record.delivered_at = Some(delivered_at);
        }
        if let Some(channels) = patch.channels {
            record.channels = channels;
        }
        if let Some(channel_results) = patch.channel_results {
            record.channel_results = channel_results;
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn statistics(&self, user_id: Option<&str>) -> Result<DeliveryStatistics> {
        let mut stats = DeliveryStatistics::default();

        for record in self.records.iter() {
            if let Some(user_id) = user_id {
                if record.recipient_id != user_id {
                    continue;
                }
            }

            stats.total += 1;
            *stats
                .by_status
                .entry(record.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_kind
                .entry(record.kind.as_str().to_string())
                .or_default() += 1;
            for channel in record.channel_results.keys() {
                *stats
                    .by_channel
                    .entry(channel.as_str().to_string())
                    .or_default() += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::notification::{
        Channel, ChannelResult, NotificationKind, NotificationRequest, NotificationStatus,
    };

    fn record_for(user: &str, status: NotificationStatus) -> Notification {
        let request = NotificationRequest::builder(NotificationKind::BookingConfirmed, user)
            .title("t")
            .message("m")
            .build();
        Notification::from_request(&request, vec![Channel::Email], status)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryDeliveryStore::new();
        let id = store
            .create(record_for("user-1", NotificationStatus::Pending))
            .await
            .unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.recipient_id, "user-1");
        assert_eq!(record.status, NotificationStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_applies_patch() {
        let store = MemoryDeliveryStore::new();
        let id = store
            .create(record_for("user-1", NotificationStatus::Pending))
            .await
            .unwrap();

        let mut results = HashMap::new();
        results.insert(
            Channel::Email,
            ChannelResult::ok(Channel::Email, Some("smtp-1".to_string())),
        );

        store
            .update(
                id,
                DeliveryUpdate {
                    status: Some(NotificationStatus::Delivered),
                    delivered_at: Some(chrono::Utc::now()),
                    channels: None,
                    channel_results: Some(results),
                },
            )
            .await
            .unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, NotificationStatus::Delivered);
        assert!(record.delivered_at.is_some());
        assert_eq!(record.channel_results.len(), 1);
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_id() {
        let store = MemoryDeliveryStore::new();
        let result = store
            .update(
                Uuid::new_v4(),
                DeliveryUpdate::status(NotificationStatus::Failed),
            )
            .await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transition() {
        let store = MemoryDeliveryStore::new();
        let id = store
            .create(record_for("user-1", NotificationStatus::Pending))
            .await
            .unwrap();

        store
            .update(id, DeliveryUpdate::status(NotificationStatus::Delivered))
            .await
            .unwrap();

        // Terminal states cannot be left
        let result = store
            .update(id, DeliveryUpdate::status(NotificationStatus::Pending))
            .await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_statistics() {
        let store = MemoryDeliveryStore::new();

        let mut delivered = record_for("user-1", NotificationStatus::Delivered);
        delivered.channel_results.insert(
            Channel::Email,
            ChannelResult::ok(Channel::Email, None),
        );
        store.create(delivered).await.unwrap();

        store
            .create(record_for("user-1", NotificationStatus::Failed))
            .await
            .unwrap();
        store
            .create(record_for("user-2", NotificationStatus::Delivered))
            .await
            .unwrap();

        let all = store.statistics(None).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.by_status.get("delivered").copied(), Some(2));
        assert_eq!(all.by_status.get("failed").copied(), Some(1));
        assert_eq!(all.by_channel.get("email").copied(), Some(1));

        let scoped = store.statistics(Some("user-1")).await.unwrap();
        assert_eq!(scoped.total, 2);
        assert_eq!(
            scoped.by_kind.get("booking_confirmed").copied(),
            Some(2)
        );
    }
}

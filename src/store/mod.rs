//! Delivery record store contract.
//!
//! The engine persists one [`Notification`] per dispatch and patches it
//! exactly once per attempt. Backing storage is an external collaborator;
//! [`MemoryDeliveryStore`] is the reference implementation used in tests
//! and lightweight embeddings.

mod memory;

pub use memory::MemoryDeliveryStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::notification::{Channel, ChannelResult, Notification, NotificationStatus};

/// Patch applied to a notification record after a dispatch attempt.
///
/// Status changes are checked against the notification state machine.
#[derive(Debug, Clone, Default)]
pub struct DeliveryUpdate {
    pub status: Option<NotificationStatus>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub channels: Option<Vec<Channel>>,
    pub channel_results: Option<HashMap<Channel, ChannelResult>>,
}

impl DeliveryUpdate {
    pub fn status(status: NotificationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Aggregate delivery counts.
///
/// Channel counts are attempted sends per channel, successful or not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryStatistics {
    pub total: u64,
    pub by_status: HashMap<String, u64>,
    pub by_kind: HashMap<String, u64>,
    pub by_channel: HashMap<String, u64>,
}

/// Delivery record storage contract.
#[async_trait]
pub trait DeliveryRecordStore: Send + Sync {
    /// Persist a new record, returning its id.
    async fn create(&self, notification: Notification) -> Result<Uuid>;

    /// Apply a patch to an existing record.
    ///
    /// Fails on an unknown id or an illegal status transition.
    async fn update(&self, id: Uuid, patch: DeliveryUpdate) -> Result<()>;

    /// Fetch a record by id.
    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Aggregate counts by status, type, and channel, optionally scoped to
    /// one recipient.
    async fn statistics(&self, user_id: Option<&str>) -> Result<DeliveryStatistics>;
}

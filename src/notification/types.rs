use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Delivery transport for one notification send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    Webhook,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::Webhook => "webhook",
            Channel::InApp => "in_app",
        }
    }

    /// Channels suppressed during a user's quiet hours (non-urgent sends only)
    pub fn is_interruptive(&self) -> bool {
        matches!(self, Channel::Sms | Channel::Push)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical notification types of the rental marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmed,
    BookingCancelled,
    BookingReminder,
    PaymentReceived,
    PaymentFailed,
    SecurityAlert,
    MessageReceived,
    ListingApproved,
    SystemAnnouncement,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingConfirmed => "booking_confirmed",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::BookingReminder => "booking_reminder",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::SecurityAlert => "security_alert",
            NotificationKind::MessageReceived => "message_received",
            NotificationKind::ListingApproved => "listing_approved",
            NotificationKind::SystemAnnouncement => "system_announcement",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority, can be delayed
    Low,
    /// Normal priority (default)
    #[default]
    Normal,
    /// High priority, should be delivered promptly
    High,
    /// Urgent priority, bypasses quiet hours
    Urgent,
}

impl Priority {
    /// Get numeric value for priority comparison
    pub fn as_weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_weight().cmp(&other.as_weight())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        f.write_str(s)
    }
}

/// Delivery status of a persisted notification record.
///
/// Terminal states are never left through this engine; a resend is a new
/// record, not a reopened one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Created, dispatch attempt in flight
    Pending,
    /// Deferred, waiting for the scheduler to pick it up
    Scheduled,
    /// Every resolved channel succeeded
    Delivered,
    /// At least one but not all channels succeeded
    PartiallyDelivered,
    /// No channel succeeded
    Failed,
    /// Refused before any channel attempt because the request had expired
    Expired,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Scheduled => "scheduled",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::PartiallyDelivered => "partially_delivered",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Delivered
                | NotificationStatus::PartiallyDelivered
                | NotificationStatus::Failed
                | NotificationStatus::Expired
        )
    }

    /// Check whether a transition to `next` is legal.
    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        match self {
            NotificationStatus::Scheduled => matches!(
                next,
                NotificationStatus::Pending | NotificationStatus::Expired
            ),
            NotificationStatus::Pending => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one channel send within one dispatch attempt.
///
/// Never mutated after creation; a retry produces a new dispatch attempt
/// with fresh results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: Channel,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
}

impl ChannelResult {
    pub fn ok(channel: Channel, provider_message_id: Option<String>) -> Self {
        Self {
            channel,
            success: true,
            provider_message_id,
            error: None,
            delivered_at: Some(Utc::now()),
        }
    }

    pub fn failed(channel: Channel, error: impl Into<String>) -> Self {
        Self {
            channel,
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
            delivered_at: None,
        }
    }
}

/// Caller-supplied dispatch request.
///
/// Immutable once handed to the engine. `recipient_email` and
/// `recipient_phone` are direct-address overrides; address lookup from a
/// user profile belongs to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub recipient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_phone: Option<String>,
    pub title: String,
    pub message: String,
    /// Free-form structured payload, also the variable source for templated sends
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub priority: Priority,
    /// Explicit channel override; bypasses preference resolution when non-empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<Channel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl NotificationRequest {
    /// Create a builder for a request to the given recipient
    pub fn builder(
        kind: NotificationKind,
        recipient_id: impl Into<String>,
    ) -> NotificationRequestBuilder {
        NotificationRequestBuilder::new(kind, recipient_id)
    }

    /// Check the dispatch invariants.
    ///
    /// Missing recipient, title, or message is a validation failure, never
    /// a silent default.
    pub fn validate(&self) -> Result<()> {
        if self.recipient_id.trim().is_empty() {
            return Err(Error::Validation("recipient id is required".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }
        if self.message.trim().is_empty() {
            return Err(Error::Validation("message is required".to_string()));
        }
        Ok(())
    }

    /// Check if the request has expired relative to `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Builder for creating notification requests
#[derive(Debug, Clone)]
pub struct NotificationRequestBuilder {
    kind: NotificationKind,
    recipient_id: String,
    recipient_email: Option<String>,
    recipient_phone: Option<String>,
    title: String,
    message: String,
    data: serde_json::Value,
    priority: Priority,
    channels: Option<Vec<Channel>>,
    scheduled_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    metadata: HashMap<String, String>,
}

impl NotificationRequestBuilder {
    pub fn new(kind: NotificationKind, recipient_id: impl Into<String>) -> Self {
        Self {
            kind,
            recipient_id: recipient_id.into(),
            recipient_email: None,
            recipient_phone: None,
            title: String::new(),
            message: String::new(),
            data: serde_json::Value::Null,
            priority: Priority::default(),
            channels: None,
            scheduled_at: None,
            expires_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn email(mut self, address: impl Into<String>) -> Self {
        self.recipient_email = Some(address.into());
        self
    }

    pub fn phone(mut self, number: impl Into<String>) -> Self {
        self.recipient_phone = Some(number.into());
        self
    }

    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Use the named template for title/body rendering at dispatch time
    pub fn template(self, name: impl Into<String>) -> Self {
        self.metadata("template", name)
    }

    pub fn build(self) -> NotificationRequest {
        NotificationRequest {
            kind: self.kind,
            recipient_id: self.recipient_id,
            recipient_email: self.recipient_email,
            recipient_phone: self.recipient_phone,
            title: self.title,
            message: self.message,
            data: self.data,
            priority: self.priority,
            channels: self.channels,
            scheduled_at: self.scheduled_at,
            expires_at: self.expires_at,
            metadata: self.metadata,
        }
    }
}

/// Persisted notification record, owned by the delivery record store.
///
/// Mutated by the orchestrator exactly once per dispatch attempt (status
/// transition plus channel results); channel adapters never touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    /// Channel set resolved for the dispatch attempt
    pub channels: Vec<Channel>,
    pub priority: Priority,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel_results: HashMap<Channel, ChannelResult>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Notification {
    /// Create a record from a request at dispatch or schedule time
    pub fn from_request(
        request: &NotificationRequest,
        channels: Vec<Channel>,
        status: NotificationStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: request.kind,
            recipient_id: request.recipient_id.clone(),
            title: request.title.clone(),
            message: request.message.clone(),
            channels,
            priority: request.priority,
            status,
            created_at: Utc::now(),
            scheduled_at: request.scheduled_at,
            delivered_at: None,
            channel_results: HashMap::new(),
            metadata: request.metadata.clone(),
        }
    }
}

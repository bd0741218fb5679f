//! Template storage contract and in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;

use super::types::Template;
use crate::error::Result;
use crate::notification::{Channel, NotificationKind, Priority};

/// Template storage contract.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Look up a template by name.
    async fn template(&self, name: &str) -> Option<Template>;

    /// Create or replace a template. The definition is validated first.
    async fn upsert(&self, template: Template) -> Result<()>;

    /// List all stored templates.
    async fn list(&self) -> Vec<Template>;
}

/// In-memory template store.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: DashMap<String, Template>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn template(&self, name: &str) -> Option<Template> {
        self.templates.get(name).map(|t| t.clone())
    }

    async fn upsert(&self, template: Template) -> Result<()> {
        template.validate()?;
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    async fn list(&self) -> Vec<Template> {
        self.templates.iter().map(|t| t.clone()).collect()
    }
}

/// Seed the marketplace's standard templates.
///
/// Called once at startup by the embedding application; existing templates
/// with the same names are replaced. Returns the number of templates seeded.
pub async fn seed_default_templates(store: &dyn TemplateStore) -> Result<usize> {
    let defaults = default_templates();
    let count = defaults.len();

    for template in defaults {
        store.upsert(template).await?;
    }

    tracing::info!(count = count, "Seeded default notification templates");
    Ok(count)
}

fn default_templates() -> Vec<Template> {
    vec![
        Template {
            name: "booking_confirmed".to_string(),
            kind: NotificationKind::BookingConfirmed,
            title: "Booking confirmed: {{listing}}".to_string(),
            body: "Your booking of {{listing}} from {{start_date}} to {{end_date}} is confirmed."
                .to_string(),
            default_channels: vec![Channel::Email, Channel::Push],
            default_priority: Priority::Normal,
            variables: vec![
                "listing".to_string(),
                "start_date".to_string(),
                "end_date".to_string(),
            ],
            active: true,
        },
        Template {
            name: "booking_cancelled".to_string(),
            kind: NotificationKind::BookingCancelled,
            title: "Booking cancelled: {{listing}}".to_string(),
            body: "Your booking of {{listing}} was cancelled. {{reason}}".to_string(),
            default_channels: vec![Channel::Email, Channel::Push],
            default_priority: Priority::High,
            variables: vec!["listing".to_string(), "reason".to_string()],
            active: true,
        },
        Template {
            name: "booking_reminder".to_string(),
            kind: NotificationKind::BookingReminder,
            title: "Upcoming booking: {{listing}}".to_string(),
            body: "Reminder: your booking of {{listing}} starts on {{start_date}}.".to_string(),
            default_channels: vec![Channel::Email, Channel::Push],
            default_priority: Priority::Normal,
            variables: vec!["listing".to_string(), "start_date".to_string()],
            active: true,
        },
        Template {
            name: "payment_received".to_string(),
            kind: NotificationKind::PaymentReceived,
            title: "Payment received".to_string(),
            body: "We received your payment of {{amount}} for booking {{booking_id}}.".to_string(),
            default_channels: vec![Channel::Email],
            default_priority: Priority::Normal,
            variables: vec!["amount".to_string(), "booking_id".to_string()],
            active: true,
        },
        Template {
            name: "payment_failed".to_string(),
            kind: NotificationKind::PaymentFailed,
            title: "Payment failed".to_string(),
            body: "Your payment of {{amount}} for booking {{booking_id}} failed: {{reason}}"
                .to_string(),
            default_channels: vec![Channel::Email, Channel::Sms],
            default_priority: Priority::High,
            variables: vec![
                "amount".to_string(),
                "booking_id".to_string(),
                "reason".to_string(),
            ],
            active: true,
        },
        Template {
            name: "security_alert".to_string(),
            kind: NotificationKind::SecurityAlert,
            title: "Security alert on your account".to_string(),
            body: "We noticed {{activity}} on your account. If this was not you, secure your account now."
                .to_string(),
            default_channels: vec![Channel::Email, Channel::Sms, Channel::Push],
            default_priority: Priority::Urgent,
            variables: vec!["activity".to_string()],
            active: true,
        },
        Template {
            name: "message_received".to_string(),
            kind: NotificationKind::MessageReceived,
            title: "New message from {{sender}}".to_string(),
            body: "{{sender}} sent you a message about {{listing}}.".to_string(),
            default_channels: vec![Channel::Push, Channel::InApp],
            default_priority: Priority::Normal,
            variables: vec!["sender".to_string(), "listing".to_string()],
            active: true,
        },
    ]
}

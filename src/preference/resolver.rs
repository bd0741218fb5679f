//! Channel resolution policy.
//!
//! Resolution order:
//! 1. A non-empty explicit channel list from the caller wins verbatim.
//! 2. Otherwise the per-type default channel set applies.
//! 3. The set is filtered by the user's enablement; an emptied set falls
//!    back to email so a notification is never silently dropped.
//! 4. Quiet hours suppress SMS and push for non-urgent priorities; urgent
//!    priority bypasses quiet hours entirely.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{PreferenceStore, UserPreference};
use crate::notification::{Channel, NotificationKind, Priority};

/// Default channel set per notification type
pub fn default_channels(kind: NotificationKind) -> &'static [Channel] {
    match kind {
        NotificationKind::BookingConfirmed => &[Channel::Email, Channel::Push],
        NotificationKind::BookingCancelled => &[Channel::Email, Channel::Push],
        NotificationKind::BookingReminder => &[Channel::Email, Channel::Push],
        NotificationKind::PaymentReceived => &[Channel::Email],
        NotificationKind::PaymentFailed => &[Channel::Email, Channel::Sms],
        NotificationKind::SecurityAlert => &[Channel::Email, Channel::Sms, Channel::Push],
        NotificationKind::MessageReceived => &[Channel::Push, Channel::InApp],
        NotificationKind::ListingApproved => &[Channel::Email, Channel::InApp],
        NotificationKind::SystemAnnouncement => &[Channel::Email, Channel::InApp],
    }
}

/// Resolves the channel set for one dispatch.
pub struct PreferenceResolver {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceResolver {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Resolve the ordered channel set for a user and notification type.
    pub async fn resolve(
        &self,
        user_id: &str,
        kind: NotificationKind,
        explicit: Option<&[Channel]>,
        priority: Priority,
    ) -> Vec<Channel> {
        let preferences = self.store.preferences_for(user_id).await;
        resolve_with(preferences.as_ref(), kind, explicit, priority, Utc::now())
    }
}

/// Pure resolution step, evaluated at an explicit instant.
pub fn resolve_with(
    preferences: Option<&UserPreference>,
    kind: NotificationKind,
    explicit: Option<&[Channel]>,
    priority: Priority,
    now: DateTime<Utc>,
) -> Vec<Channel> {
    // Explicit intent overrides preference
    if let Some(list) = explicit {
        if !list.is_empty() {
            return list.to_vec();
        }
    }

    let mut channels: Vec<Channel> = default_channels(kind).to_vec();

    if let Some(preferences) = preferences {
        channels.retain(|c| preferences.allows(*c));

        // Dropping a notification entirely is a correctness bug; email is
        // the guaranteed fallback channel.
        if channels.is_empty() {
            channels.push(Channel::Email);
        }

        if priority != Priority::Urgent {
            if let Some(quiet_hours) = &preferences.quiet_hours {
                if quiet_hours.contains(now) {
                    channels.retain(|c| !c.is_interruptive());
                    if channels.is_empty() {
                        channels.push(Channel::Email);
                    }
                    tracing::debug!(
                        user_id = %preferences.user_id,
                        kind = %kind,
                        "Quiet hours active, suppressed interruptive channels"
                    );
                }
            }
        }
    }

    channels
}

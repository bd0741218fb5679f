//! User notification preferences and channel routing policy.

mod resolver;
mod store;

pub use resolver::{default_channels, resolve_with, PreferenceResolver};
pub use store::{MemoryPreferenceStore, PreferenceStore};

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::notification::Channel;

/// A per-user quiet-hours window.
///
/// Evaluated in the user's own timezone; windows may wrap midnight
/// (e.g. 22:00 to 07:00).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// IANA timezone name, e.g. "Europe/Paris"
    pub timezone: String,
}

impl QuietHours {
    /// Check whether `now` falls inside the window.
    ///
    /// An unparseable timezone is evaluated as UTC rather than disabling
    /// the window.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let tz: Tz = match self.timezone.parse() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::debug!(timezone = %self.timezone, "Unknown timezone, evaluating quiet hours in UTC");
                chrono_tz::UTC
            }
        };
        let local = now.with_timezone(&tz).time();

        if self.start <= self.end {
            local >= self.start && local < self.end
        } else {
            // Window wraps midnight
            local >= self.start || local < self.end
        }
    }
}

/// Per-user notification preferences.
///
/// Read-only input to the resolver; the engine never mutates preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: String,
    /// Master switch; `false` disables every channel
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-channel enablement; channels absent from the map are enabled
    #[serde(default)]
    pub channel_enabled: HashMap<Channel, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,
}

fn default_enabled() -> bool {
    true
}

impl UserPreference {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            enabled: true,
            channel_enabled: HashMap::new(),
            quiet_hours: None,
        }
    }

    pub fn with_channel(mut self, channel: Channel, enabled: bool) -> Self {
        self.channel_enabled.insert(channel, enabled);
        self
    }

    pub fn with_quiet_hours(mut self, quiet_hours: QuietHours) -> Self {
        self.quiet_hours = Some(quiet_hours);
        self
    }

    /// Whether the user allows the given channel
    pub fn allows(&self, channel: Channel) -> bool {
        self.enabled && self.channel_enabled.get(&channel).copied().unwrap_or(true)
    }
}

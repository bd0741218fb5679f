//! Template types

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::notification::{Channel, NotificationKind, Priority};

/// A notification template definition.
///
/// Read-only at dispatch time; creation and updates happen through the
/// template store before the engine runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Unique template name (alphanumeric, dash, underscore)
    pub name: String,

    /// Notification type produced from this template
    pub kind: NotificationKind,

    /// Title pattern with `{{variable}}` placeholders
    pub title: String,

    /// Body pattern with `{{variable}}` placeholders
    pub body: String,

    /// Channels used when the caller supplies none
    #[serde(default)]
    pub default_channels: Vec<Channel>,

    /// Priority used when the caller supplies none
    #[serde(default)]
    pub default_priority: Priority,

    /// Declared variable names, in substitution order
    #[serde(default)]
    pub variables: Vec<String>,

    /// Inactive templates are treated as not found
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Template {
    /// Validate the template definition.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > 64 {
            return Err(Error::Validation(
                "template name must be 1-64 characters".to_string(),
            ));
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Validation(
                "template name must contain only alphanumeric, dash, or underscore".to_string(),
            ));
        }

        if self.title.is_empty() {
            return Err(Error::Validation(
                "template title pattern is required".to_string(),
            ));
        }

        if self.body.is_empty() {
            return Err(Error::Validation(
                "template body pattern is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// A rendered title/body pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub title: String,
    pub body: String,
}

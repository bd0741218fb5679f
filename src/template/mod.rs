//! Notification templates.
//!
//! A minimal substitution engine: named templates carry `{{variable}}`
//! placeholders in their title and body patterns. There is no control flow;
//! unresolved tokens are left verbatim and callers are responsible for
//! supplying every declared variable.

mod store;
mod substitution;
mod types;

pub use store::{seed_default_templates, MemoryTemplateStore, TemplateStore};
pub use substitution::{substitute, variables_from_value};
pub use types::{Rendered, Template};

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::notification::NotificationRequest;

/// Resolves named templates and renders title/body pairs.
pub struct TemplateRenderer {
    store: Arc<dyn TemplateStore>,
}

impl TemplateRenderer {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Render the named template with the given variables.
    ///
    /// An unknown or inactive template name is a `TemplateNotFound` error.
    pub async fn render(
        &self,
        name: &str,
        variables: &HashMap<String, String>,
    ) -> Result<Rendered> {
        let template = self.get_active(name).await?;
        Ok(Rendered {
            title: substitute(&template.title, variables),
            body: substitute(&template.body, variables),
        })
    }

    /// Build a dispatch request from a template, applying the template's
    /// default channels and priority.
    pub async fn build_request(
        &self,
        name: &str,
        recipient_id: &str,
        data: serde_json::Value,
    ) -> Result<NotificationRequest> {
        let template = self.get_active(name).await?;
        let variables = variables_from_value(&data);

        let mut builder = NotificationRequest::builder(template.kind, recipient_id)
            .title(substitute(&template.title, &variables))
            .message(substitute(&template.body, &variables))
            .priority(template.default_priority)
            .data(data);
        if !template.default_channels.is_empty() {
            builder = builder.channels(template.default_channels.clone());
        }
        Ok(builder.build())
    }

    async fn get_active(&self, name: &str) -> Result<Template> {
        self.store
            .template(name)
            .await
            .filter(|t| t.active)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }
}

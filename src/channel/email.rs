//! Email channel adapter.
//!
//! Transport is behind the [`EmailProvider`] contract; SMTP configuration
//! and credentials belong to the embedding application.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ChannelAdapter, ChannelMessage, ProviderResponse};
use crate::notification::{Channel, ChannelResult};

/// External email provider contract.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, email: &EmailMessage) -> ProviderResponse;
}

/// Message shape handed to the email provider
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Email notification adapter.
pub struct EmailAdapter {
    provider: Arc<dyn EmailProvider>,
}

impl EmailAdapter {
    pub fn new(provider: Arc<dyn EmailProvider>) -> Self {
        Self { provider }
    }

    /// Build and validate the provider message, failing fast before any
    /// transport call.
    fn build_message(&self, message: &ChannelMessage) -> Result<EmailMessage, String> {
        let to = message
            .recipient_email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "no recipient email address on request".to_string())?;

        if !is_valid_email(to) {
            return Err(format!("invalid recipient email address: {}", to));
        }

        Ok(EmailMessage {
            to: to.to_string(),
            subject: message.title.clone(),
            html: build_body_html(message),
            text: build_body_text(message),
        })
    }
}

/// Build the email body (plain text).
fn build_body_text(message: &ChannelMessage) -> String {
    format!(
        "{}\n\n{}\n\nType: {}\nPriority: {}",
        message.title, message.body, message.kind, message.priority
    )
}

/// Build the email body (HTML).
fn build_body_html(message: &ChannelMessage) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; margin: 20px;">
    <h2>{}</h2>
    <p>{}</p>
    <p style="color: #666; font-size: 12px;">Type: {} | Priority: {}</p>
</body>
</html>"#,
        message.title, message.body, message.kind, message.priority
    )
}

fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !address.contains(char::is_whitespace)
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, message: &ChannelMessage) -> ChannelResult {
        let email = match self.build_message(message) {
            Ok(email) => email,
            Err(error) => {
                tracing::debug!(
                    notification_id = %message.notification_id,
                    error = %error,
                    "Email payload validation failed"
                );
                return ChannelResult::failed(Channel::Email, error);
            }
        };

        let response = self.provider.send_email(&email).await;
        if response.success {
            tracing::debug!(
                notification_id = %message.notification_id,
                to = %email.to,
                "Email sent"
            );
            ChannelResult::ok(Channel::Email, response.message_id)
        } else {
            let error = response
                .error
                .unwrap_or_else(|| "email provider rejected the message".to_string());
            tracing::warn!(
                notification_id = %message.notification_id,
                error = %error,
                "Email send failed"
            );
            ChannelResult::failed(Channel::Email, error)
        }
    }
}

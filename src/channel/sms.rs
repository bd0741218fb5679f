//! SMS channel adapter.
//!
//! Transport is behind the [`SmsProvider`] contract; gateway credentials
//! belong to the embedding application.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ChannelAdapter, ChannelMessage, ProviderResponse};
use crate::notification::{Channel, ChannelResult};

/// Carriers reject concatenated messages beyond this length.
const MAX_SMS_LEN: usize = 1600;

/// External SMS gateway contract.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, sms: &SmsMessage) -> ProviderResponse;
}

/// Message shape handed to the SMS gateway
#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

/// SMS notification adapter.
pub struct SmsAdapter {
    provider: Arc<dyn SmsProvider>,
}

impl SmsAdapter {
    pub fn new(provider: Arc<dyn SmsProvider>) -> Self {
        Self { provider }
    }

    fn build_message(&self, message: &ChannelMessage) -> Result<SmsMessage, String> {
        let to = message
            .recipient_phone
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "no recipient phone number on request".to_string())?;

        if !is_valid_phone(to) {
            return Err(format!("invalid recipient phone number: {}", to));
        }

        let mut body = format!("{}: {}", message.title, message.body);
        if body.chars().count() > MAX_SMS_LEN {
            body = body.chars().take(MAX_SMS_LEN).collect();
        }

        Ok(SmsMessage {
            to: to.to_string(),
            body,
        })
    }
}

/// E.164-style check: optional leading `+`, 7 to 15 digits, separators allowed.
fn is_valid_phone(number: &str) -> bool {
    let stripped = number.strip_prefix('+').unwrap_or(number);
    let digits: String = stripped
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[async_trait]
impl ChannelAdapter for SmsAdapter {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, message: &ChannelMessage) -> ChannelResult {
        let sms = match self.build_message(message) {
            Ok(sms) => sms,
            Err(error) => {
                tracing::debug!(
                    notification_id = %message.notification_id,
                    error = %error,
                    "SMS payload validation failed"
                );
                return ChannelResult::failed(Channel::Sms, error);
            }
        };

        let response = self.provider.send_sms(&sms).await;
        if response.success {
            tracing::debug!(
                notification_id = %message.notification_id,
                "SMS sent"
            );
            ChannelResult::ok(Channel::Sms, response.message_id)
        } else {
            let error = response
                .error
                .unwrap_or_else(|| "sms gateway rejected the message".to_string());
            tracing::warn!(
                notification_id = %message.notification_id,
                error = %error,
                "SMS send failed"
            );
            ChannelResult::failed(Channel::Sms, error)
        }
    }
}

//! Generic webhook channel adapter (HTTP POST).

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ChannelAdapter, ChannelMessage};
use crate::notification::{Channel, ChannelResult};

/// Per-request metadata key overriding the configured endpoint
const URL_METADATA_KEY: &str = "webhook_url";

/// Webhook channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Default endpoint; a request may override it via `webhook_url` metadata.
    pub endpoint: Option<String>,
    /// HTTP method (default: POST).
    #[serde(default = "default_method")]
    pub method: String,
    /// Custom headers.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Authentication type.
    pub auth: Option<WebhookAuth>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_timeout() -> u64 {
    10
}

/// Webhook authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookAuth {
    /// Bearer token authentication.
    Bearer { token: String },
    /// Basic authentication.
    Basic { username: String, password: String },
    /// Custom header authentication.
    Header { name: String, value: String },
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            method: default_method(),
            headers: Vec::new(),
            auth: None,
            timeout_seconds: default_timeout(),
        }
    }
}

/// Generic webhook notification adapter.
pub struct WebhookAdapter {
    config: WebhookConfig,
    client: Client,
}

impl WebhookAdapter {
    pub fn new(config: WebhookConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    /// Pick the endpoint for one message, failing fast on a missing or
    /// non-HTTP URL.
    fn resolve_url(&self, message: &ChannelMessage) -> Result<String, String> {
        let url = message
            .metadata
            .get(URL_METADATA_KEY)
            .map(String::as_str)
            .or(self.config.endpoint.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "no webhook endpoint configured or supplied".to_string())?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("invalid webhook url: {}", url));
        }

        Ok(url.to_string())
    }

    /// Build the request headers.
    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in &self.config.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                headers.insert(name, value);
            }
        }

        if let Some(auth) = &self.config.auth {
            match auth {
                WebhookAuth::Bearer { token } => {
                    if let Ok(value) = format!("Bearer {}", token).parse() {
                        headers.insert(reqwest::header::AUTHORIZATION, value);
                    }
                }
                WebhookAuth::Header { name, value } => {
                    if let (Ok(name), Ok(value)) = (
                        name.parse::<reqwest::header::HeaderName>(),
                        value.parse::<reqwest::header::HeaderValue>(),
                    ) {
                        headers.insert(name, value);
                    }
                }
                WebhookAuth::Basic { .. } => {
                    // Basic auth is handled separately in the request builder
                }
            }
        }

        headers
    }

    /// Build the JSON payload.
    fn build_payload(&self, message: &ChannelMessage) -> serde_json::Value {
        json!({
            "notification_id": message.notification_id,
            "type": message.kind,
            "recipient_id": message.recipient_id,
            "title": message.title,
            "message": message.body,
            "priority": message.priority,
            "data": message.data,
            "sent_at": chrono::Utc::now(),
        })
    }
}

#[async_trait]
impl ChannelAdapter for WebhookAdapter {
    fn channel(&self) -> Channel {
        Channel::Webhook
    }

    async fn send(&self, message: &ChannelMessage) -> ChannelResult {
        let url = match self.resolve_url(message) {
            Ok(url) => url,
            Err(error) => {
                tracing::debug!(
                    notification_id = %message.notification_id,
                    error = %error,
                    "Webhook payload validation failed"
                );
                return ChannelResult::failed(Channel::Webhook, error);
            }
        };

        let payload = self.build_payload(message);
        let headers = self.build_headers();

        let mut request = match self.config.method.to_uppercase().as_str() {
            "PUT" => self.client.put(&url),
            _ => self.client.post(&url),
        };

        request = request.headers(headers).json(&payload);

        if let Some(WebhookAuth::Basic { username, password }) = &self.config.auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    notification_id = %message.notification_id,
                    error = %e,
                    "Webhook request failed"
                );
                return ChannelResult::failed(
                    Channel::Webhook,
                    format!("webhook request failed: {}", e),
                );
            }
        };

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                notification_id = %message.notification_id,
                status = %status.as_u16(),
                "Webhook delivered"
            );
            ChannelResult::ok(Channel::Webhook, Some(message.notification_id.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                notification_id = %message.notification_id,
                status = %status.as_u16(),
                "Webhook endpoint returned error"
            );
            ChannelResult::failed(
                Channel::Webhook,
                format!("webhook endpoint returned {}: {}", status, body),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::message_for;
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WebhookConfig::default();
        assert!(config.endpoint.is_none());
        assert_eq!(config.method, "POST");
        assert_eq!(config.timeout_seconds, 10);
    }

    #[test]
    fn test_resolve_url_prefers_metadata_override() {
        let adapter = WebhookAdapter::new(WebhookConfig {
            endpoint: Some("https://default.example.com/hook".to_string()),
            ..Default::default()
        });

        let mut message = message_for("user-1");
        message.metadata.insert(
            "webhook_url".to_string(),
            "https://override.example.com/hook".to_string(),
        );

        assert_eq!(
            adapter.resolve_url(&message).unwrap(),
            "https://override.example.com/hook"
        );
    }

    #[test]
    fn test_resolve_url_rejects_missing_and_invalid() {
        let adapter = WebhookAdapter::new(WebhookConfig::default());
        let message = message_for("user-1");
        assert!(adapter.resolve_url(&message).is_err());

        let adapter = WebhookAdapter::new(WebhookConfig {
            endpoint: Some("ftp://example.com".to_string()),
            ..Default::default()
        });
        assert!(adapter.resolve_url(&message).is_err());
    }

    #[tokio::test]
    async fn test_missing_endpoint_fails_without_request() {
        let adapter = WebhookAdapter::new(WebhookConfig::default());
        let result = adapter.send(&message_for("user-1")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no webhook endpoint"));
    }

    #[test]
    fn test_build_headers_with_bearer() {
        let adapter = WebhookAdapter::new(WebhookConfig {
            endpoint: Some("https://example.com/hook".to_string()),
            auth: Some(WebhookAuth::Bearer {
                token: "test-token".to_string(),
            }),
            ..Default::default()
        });
        let headers = adapter.build_headers();
        assert!(headers.contains_key(reqwest::header::AUTHORIZATION));
    }

    #[test]
    fn test_build_payload() {
        let adapter = WebhookAdapter::new(WebhookConfig::default());
        let message = message_for("user-1");

        let payload = adapter.build_payload(&message);
        assert_eq!(payload["type"], "system_announcement");
        assert_eq!(payload["recipient_id"], "user-1");
        assert_eq!(payload["title"], "Title");
        assert_eq!(payload["priority"], "normal");
    }
}

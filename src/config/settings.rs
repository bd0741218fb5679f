use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::channel::{InAppConfig, WebhookConfig};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub inbox: InAppConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for a single channel adapter call in seconds
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_seconds: u64,
    /// Buffer size of the lifecycle event broadcast channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of due entries processed per sweep
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch_size: usize,
    /// Sweep cadence in seconds, for the external timer that drives the scheduler
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_adapter_timeout() -> u64 {
    10
}

fn default_event_buffer() -> usize {
    256
}

fn default_sweep_batch() -> usize {
    100
}

fn default_poll_interval() -> u64 {
    60 // 1 minute
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("dispatch.adapter_timeout_seconds", 10)?
            .set_default("dispatch.event_buffer_size", 256)?
            .set_default("scheduler.sweep_batch_size", 100)?
            .set_default("scheduler.poll_interval_seconds", 60)?
            .set_default("webhook.method", "POST")?
            .set_default("webhook.timeout_seconds", 10)?
            .set_default("inbox.max_inbox_size", 100)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // DISPATCH__ADAPTER_TIMEOUT_SECONDS, WEBHOOK__ENDPOINT, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_seconds: default_adapter_timeout(),
            event_buffer_size: default_event_buffer(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_batch_size: default_sweep_batch(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

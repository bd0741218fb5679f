//! Dispatch orchestrator.
//!
//! Validates a request, resolves its channel set, renders a template when
//! one is named, fans out to every channel adapter concurrently, aggregates
//! the per-channel outcomes into one delivery record write, and emits a
//! lifecycle event for observers.

mod stats;

pub use stats::{EngineStats, EngineStatsSnapshot};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::channel::{AdapterRegistry, ChannelMessage};
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::notification::{
    ChannelResult, Notification, NotificationRequest, NotificationStatus,
};
use crate::preference::PreferenceResolver;
use crate::store::{DeliveryRecordStore, DeliveryUpdate};
use crate::template::{variables_from_value, TemplateRenderer};

/// Lifecycle event emitted after each dispatch attempt.
///
/// Emission failures never affect the dispatch outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Sent {
        notification_id: Uuid,
        status: NotificationStatus,
    },
    Failed {
        notification_id: Uuid,
        errors: Vec<String>,
    },
    Expired {
        notification_id: Uuid,
    },
}

/// Result of one dispatch attempt
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    /// True only when every resolved channel succeeded
    pub success: bool,
    pub notification_id: Uuid,
    pub status: NotificationStatus,
    pub channel_results: Vec<ChannelResult>,
    /// Populated only from failed channels, never swallowed
    pub errors: Vec<String>,
}

/// Per-request entry of a bulk dispatch
#[derive(Debug, Clone, Serialize)]
pub struct BulkItem {
    pub success: bool,
    pub notification_id: Option<Uuid>,
    pub errors: Vec<String>,
}

/// Result of a bulk dispatch
#[derive(Debug, Clone, Serialize)]
pub struct BulkDispatchOutcome {
    /// True only when every individual dispatch succeeded
    pub success: bool,
    pub outcomes: Vec<BulkItem>,
}

/// Dispatches notifications across their resolved channel set.
pub struct Orchestrator {
    adapters: AdapterRegistry,
    resolver: PreferenceResolver,
    renderer: TemplateRenderer,
    records: Arc<dyn DeliveryRecordStore>,
    config: DispatchConfig,
    stats: EngineStats,
    event_tx: broadcast::Sender<LifecycleEvent>,
}

impl Orchestrator {
    pub fn new(
        adapters: AdapterRegistry,
        resolver: PreferenceResolver,
        renderer: TemplateRenderer,
        records: Arc<dyn DeliveryRecordStore>,
        config: DispatchConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_buffer_size.max(1));
        Self {
            adapters,
            resolver,
            renderer,
            records,
            config,
            stats: EngineStats::default(),
            event_tx,
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }

    /// Get engine statistics
    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Dispatch one notification request.
    ///
    /// Validation failures abort before any side effect. Channel failures
    /// are reported in the outcome; they are not errors.
    #[tracing::instrument(
        name = "orchestrator.dispatch",
        skip(self, request),
        fields(kind = %request.kind, recipient_id = %request.recipient_id)
    )]
    pub async fn dispatch(&self, request: NotificationRequest) -> Result<DispatchOutcome> {
        request.validate()?;
        self.dispatch_validated(request, None).await
    }

    /// Dispatch every request independently and fully.
    ///
    /// One request's failure does not abort the batch; the aggregate
    /// succeeds only when every individual dispatch succeeded.
    #[tracing::instrument(
        name = "orchestrator.dispatch_bulk",
        skip(self, requests),
        fields(request_count = requests.len())
    )]
    pub async fn dispatch_bulk(&self, requests: Vec<NotificationRequest>) -> BulkDispatchOutcome {
        let mut outcomes = Vec::with_capacity(requests.len());

        for request in requests {
            match self.dispatch(request).await {
                Ok(outcome) => outcomes.push(BulkItem {
                    success: outcome.success,
                    notification_id: Some(outcome.notification_id),
                    errors: outcome.errors,
                }),
                Err(e) => outcomes.push(BulkItem {
                    success: false,
                    notification_id: None,
                    errors: vec![e.to_string()],
                }),
            }
        }

        BulkDispatchOutcome {
            success: outcomes.iter().all(|o| o.success),
            outcomes,
        }
    }

    /// Dispatch a due scheduled entry, reusing its persisted record.
    #[tracing::instrument(
        name = "orchestrator.dispatch_scheduled",
        skip(self, request),
        fields(notification_id = %notification_id)
    )]
    pub(crate) async fn dispatch_scheduled(
        &self,
        request: NotificationRequest,
        notification_id: Uuid,
    ) -> Result<DispatchOutcome> {
        request.validate()?;

        if request.is_expired(Utc::now()) {
            return self.expire(notification_id).await;
        }

        // Pickup transition: Scheduled -> Pending
        self.records
            .update(
                notification_id,
                DeliveryUpdate::status(NotificationStatus::Pending),
            )
            .await?;

        self.dispatch_validated(request, Some(notification_id)).await
    }

    async fn dispatch_validated(
        &self,
        request: NotificationRequest,
        existing: Option<Uuid>,
    ) -> Result<DispatchOutcome> {
        let channels = self
            .resolver
            .resolve(
                &request.recipient_id,
                request.kind,
                request.channels.as_deref(),
                request.priority,
            )
            .await;

        // Refuse expired requests before rendering or any channel attempt
        if request.is_expired(Utc::now()) {
            let notification_id = match existing {
                Some(id) => id,
                None => {
                    let record = Notification::from_request(
                        &request,
                        channels.clone(),
                        NotificationStatus::Pending,
                    );
                    self.records.create(record).await?
                }
            };
            return self.expire(notification_id).await;
        }

        // Render when the request names a template
        let (title, body) = match request.metadata.get("template") {
            Some(name) => {
                let variables = variables_from_value(&request.data);
                match self.renderer.render(name, &variables).await {
                    Ok(rendered) => (rendered.title, rendered.body),
                    Err(e) => {
                        if let Some(id) = existing {
                            let _ = self
                                .records
                                .update(id, DeliveryUpdate::status(NotificationStatus::Failed))
                                .await;
                        }
                        return Err(e);
                    }
                }
            }
            None => (request.title.clone(), request.message.clone()),
        };

        let notification_id = match existing {
            Some(id) => id,
            None => {
                let mut record = Notification::from_request(
                    &request,
                    channels.clone(),
                    NotificationStatus::Pending,
                );
                record.title = title.clone();
                record.message = body.clone();
                self.records.create(record).await?
            }
        };

        let message = ChannelMessage {
            notification_id,
            kind: request.kind,
            recipient_id: request.recipient_id.clone(),
            recipient_email: request.recipient_email.clone(),
            recipient_phone: request.recipient_phone.clone(),
            title,
            body,
            data: request.data.clone(),
            priority: request.priority,
            metadata: request.metadata.clone(),
        };

        let results = self.fan_out(&channels, &message).await;

        let succeeded = results.iter().filter(|r| r.success).count();
        let status = if !results.is_empty() && succeeded == results.len() {
            NotificationStatus::Delivered
        } else if succeeded > 0 {
            NotificationStatus::PartiallyDelivered
        } else {
            NotificationStatus::Failed
        };
        let delivered_at = (succeeded > 0).then(Utc::now);

        let errors: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "{}: {}",
                    r.channel,
                    r.error.as_deref().unwrap_or("send failed")
                )
            })
            .collect();

        let channel_results: HashMap<_, _> =
            results.iter().map(|r| (r.channel, r.clone())).collect();

        // Single write with the final status and the channel-result map
        self.records
            .update(
                notification_id,
                DeliveryUpdate {
                    status: Some(status),
                    delivered_at,
                    channels: Some(channels.clone()),
                    channel_results: Some(channel_results),
                },
            )
            .await?;

        self.stats
            .dispatched
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.stats
            .channel_attempts
            .fetch_add(results.len() as u64, std::sync::atomic::Ordering::Relaxed);
        self.stats.channel_failures.fetch_add(
            (results.len() - succeeded) as u64,
            std::sync::atomic::Ordering::Relaxed,
        );
        let status_counter = match status {
            NotificationStatus::Delivered => &self.stats.delivered,
            NotificationStatus::PartiallyDelivered => &self.stats.partially_delivered,
            _ => &self.stats.failed,
        };
        status_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let event = if status == NotificationStatus::Failed {
            LifecycleEvent::Failed {
                notification_id,
                errors: errors.clone(),
            }
        } else {
            LifecycleEvent::Sent {
                notification_id,
                status,
            }
        };
        let _ = self.event_tx.send(event);

        tracing::info!(
            notification_id = %notification_id,
            status = %status,
            channels = results.len(),
            succeeded = succeeded,
            "Dispatch completed"
        );

        Ok(DispatchOutcome {
            success: status == NotificationStatus::Delivered,
            notification_id,
            status,
            channel_results: results,
            errors,
        })
    }

    /// Start every channel send together and join on all of them.
    ///
    /// A slow or failing channel must not delay or block delivery on the
    /// others; each call carries its own deadline so one unresponsive
    /// transport cannot stall the dispatch past a bounded ceiling.
    async fn fan_out(
        &self,
        channels: &[crate::notification::Channel],
        message: &ChannelMessage,
    ) -> Vec<ChannelResult> {
        let deadline = Duration::from_secs(self.config.adapter_timeout_seconds.max(1));

        let sends = channels.iter().map(|&channel| {
            let adapter = self.adapters.get(channel);
            let message = message.clone();
            async move {
                let Some(adapter) = adapter else {
                    return ChannelResult::failed(channel, "no adapter registered for channel");
                };
                match tokio::time::timeout(deadline, adapter.send(&message)).await {
                    Ok(result) => result,
                    Err(_) => ChannelResult::failed(
                        channel,
                        format!("channel send timed out after {}s", deadline.as_secs()),
                    ),
                }
            }
        });

        join_all(sends).await
    }

    async fn expire(&self, notification_id: Uuid) -> Result<DispatchOutcome> {
        self.records
            .update(
                notification_id,
                DeliveryUpdate::status(NotificationStatus::Expired),
            )
            .await?;

        self.stats
            .expired
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let _ = self.event_tx.send(LifecycleEvent::Expired { notification_id });

        tracing::warn!(
            notification_id = %notification_id,
            "Refused to dispatch expired notification"
        );

        Ok(DispatchOutcome {
            success: false,
            notification_id,
            status: NotificationStatus::Expired,
            channel_results: Vec::new(),
            errors: vec!["notification expired before dispatch".to_string()],
        })
    }
}

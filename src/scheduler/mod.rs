//! Deferred notification scheduling.
//!
//! `schedule` persists a future-dated entry plus its Scheduled delivery
//! record. An external timer drives `process_scheduled_notifications`,
//! which claims each due entry, hands it to the orchestrator, and records
//! the terminal entry status. The engine never owns its own clock loop.

mod store;

pub use store::{MemoryScheduleStore, ScheduleStore};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::dispatch::Orchestrator;
use crate::error::Result;
use crate::notification::{Notification, NotificationRequest, NotificationStatus};
use crate::store::DeliveryRecordStore;

/// Processing state of a scheduled entry.
///
/// Created Pending, claimed to Processing by a sweep, and finished as Done
/// or Failed. An entry is never reused across sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

/// A notification deferred to a future due time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEntry {
    pub id: Uuid,
    /// Id of the Scheduled delivery record created alongside this entry
    pub notification_id: Uuid,
    /// The original request, replayed at dispatch time
    pub request: NotificationRequest,
    pub due_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl ScheduledEntry {
    pub fn new(notification_id: Uuid, request: NotificationRequest, due_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            notification_id,
            request,
            due_at,
            status: ScheduleStatus::Pending,
            error: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }
}

/// Outcome of one sweep over the due entries
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepOutcome {
    /// Entries this sweep claimed
    pub claimed: usize,
    /// Claimed entries whose dispatch completed
    pub dispatched: usize,
    /// Claimed entries whose dispatch errored
    pub failed: usize,
}

/// Schedules notifications for deferred delivery and sweeps due entries.
pub struct Scheduler {
    store: Arc<dyn ScheduleStore>,
    records: Arc<dyn DeliveryRecordStore>,
    orchestrator: Arc<Orchestrator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        records: Arc<dyn DeliveryRecordStore>,
        orchestrator: Arc<Orchestrator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            records,
            orchestrator,
            config,
        }
    }

    /// Persist a deferred notification, returning the scheduled entry id.
    #[tracing::instrument(
        name = "scheduler.schedule",
        skip(self, request),
        fields(kind = %request.kind, recipient_id = %request.recipient_id, due_at = %due_at)
    )]
    pub async fn schedule(
        &self,
        request: NotificationRequest,
        due_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        request.validate()?;

        let mut record = Notification::from_request(
            &request,
            request.channels.clone().unwrap_or_default(),
            NotificationStatus::Scheduled,
        );
        record.scheduled_at = Some(due_at);
        let notification_id = self.records.create(record).await?;

        let entry = ScheduledEntry::new(notification_id, request, due_at);
        let entry_id = self.store.insert(entry).await?;

        tracing::info!(
            entry_id = %entry_id,
            notification_id = %notification_id,
            "Notification scheduled"
        );
        Ok(entry_id)
    }

    /// Pending entries due at `now`, oldest first.
    pub async fn due_entries(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEntry>> {
        self.store.due_entries(now).await
    }

    /// Cancel a still-Pending entry.
    ///
    /// The Scheduled delivery record is left untouched; it simply never
    /// gets picked up.
    pub async fn cancel(&self, entry_id: Uuid) -> Result<bool> {
        let cancelled = self.store.cancel(entry_id).await?;
        if cancelled {
            tracing::info!(entry_id = %entry_id, "Scheduled notification cancelled");
        }
        Ok(cancelled)
    }

    /// Sweep the due entries once.
    ///
    /// Invoked by an external timer. Each due entry is claimed, dispatched,
    /// and marked Done or Failed; one entry's failure never aborts the
    /// sweep.
    #[tracing::instrument(name = "scheduler.sweep", skip(self))]
    pub async fn process_scheduled_notifications(&self) -> SweepOutcome {
        let now = Utc::now();
        let due = match self.store.due_entries(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch due entries");
                return SweepOutcome::default();
            }
        };

        let mut outcome = SweepOutcome::default();

        for entry in due.into_iter().take(self.config.sweep_batch_size) {
            // A concurrent sweep may have taken the entry already
            match self.store.claim(entry.id).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(entry_id = %entry.id, error = %e, "Failed to claim entry");
                    continue;
                }
            }
            outcome.claimed += 1;

            match self
                .orchestrator
                .dispatch_scheduled(entry.request.clone(), entry.notification_id)
                .await
            {
                Ok(dispatch) => {
                    outcome.dispatched += 1;
                    tracing::debug!(
                        entry_id = %entry.id,
                        notification_id = %entry.notification_id,
                        status = %dispatch.status,
                        "Scheduled notification dispatched"
                    );
                    if let Err(e) = self.store.mark_done(entry.id).await {
                        tracing::warn!(entry_id = %entry.id, error = %e, "Failed to mark entry done");
                    }
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        entry_id = %entry.id,
                        notification_id = %entry.notification_id,
                        error = %e,
                        "Scheduled dispatch failed"
                    );
                    if let Err(e) = self.store.mark_failed(entry.id, &e.to_string()).await {
                        tracing::warn!(entry_id = %entry.id, error = %e, "Failed to mark entry failed");
                    }
                }
            }
        }

        if outcome.claimed > 0 {
            tracing::info!(
                claimed = outcome.claimed,
                dispatched = outcome.dispatched,
                failed = outcome.failed,
                "Scheduled sweep completed"
            );
        }

        outcome
    }
}

//! Scheduled entry storage contract and in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{ScheduleStatus, ScheduledEntry};
use crate::error::{Error, Result};

/// Scheduled entry storage contract.
///
/// `claim` is the optimistic Pending-to-Processing transition that keeps a
/// due entry from being dispatched twice by overlapping sweeps. A durable
/// implementation would express the same claim as a conditional update.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Persist a new entry, returning its id.
    async fn insert(&self, entry: ScheduledEntry) -> Result<Uuid>;

    /// Fetch an entry by id.
    async fn get(&self, id: Uuid) -> Result<Option<ScheduledEntry>>;

    /// Pending entries with `due_at <= now`, oldest first.
    async fn due_entries(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEntry>>;

    /// Claim an entry for processing. Returns false when the entry is no
    /// longer Pending.
    async fn claim(&self, id: Uuid) -> Result<bool>;

    /// Mark a claimed entry as successfully processed.
    async fn mark_done(&self, id: Uuid) -> Result<()>;

    /// Mark a claimed entry as failed, recording the error.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;

    /// Remove a still-Pending entry. Returns false when the entry is
    /// missing or already claimed.
    async fn cancel(&self, id: Uuid) -> Result<bool>;

    /// Number of Pending entries.
    async fn pending_count(&self) -> usize;
}

/// In-memory schedule store.
#[derive(Default)]
pub struct MemoryScheduleStore {
    entries: DashMap<Uuid, ScheduledEntry>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn insert(&self, entry: ScheduledEntry) -> Result<Uuid> {
        let id = entry.id;
        self.entries.insert(id, entry);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduledEntry>> {
        Ok(self.entries.get(&id).map(|e| e.clone()))
    }

    async fn due_entries(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledEntry>> {
        let mut due: Vec<ScheduledEntry> = self
            .entries
            .iter()
            .filter(|e| e.status == ScheduleStatus::Pending && e.due_at <= now)
            .map(|e| e.clone())
            .collect();
        due.sort_by_key(|e| e.due_at);
        Ok(due)
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        let Some(mut entry) = self.entries.get_mut(&id) else {
            return Ok(false);
        };
        if entry.status != ScheduleStatus::Pending {
            return Ok(false);
        }
        entry.status = ScheduleStatus::Processing;
        Ok(true)
    }

    async fn mark_done(&self, id: Uuid) -> Result<()> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::Scheduling(format!("unknown scheduled entry: {}", id)))?;
        entry.status = ScheduleStatus::Done;
        entry.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::Scheduling(format!("unknown scheduled entry: {}", id)))?;
        entry.status = ScheduleStatus::Failed;
        entry.error = Some(error.to_string());
        entry.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> Result<bool> {
        let Some(entry) = self.entries.get(&id) else {
            return Ok(false);
        };
        if entry.status != ScheduleStatus::Pending {
            return Ok(false);
        }
        drop(entry);
        Ok(self.entries.remove(&id).is_some())
    }

    async fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == ScheduleStatus::Pending)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{NotificationKind, NotificationRequest};

    fn entry(due_at: DateTime<Utc>) -> ScheduledEntry {
        let request = NotificationRequest::builder(NotificationKind::BookingReminder, "user-1")
            .title("t")
            .message("m")
            .build();
        ScheduledEntry::new(Uuid::new_v4(), request, due_at)
    }

    #[tokio::test]
    async fn test_due_filtering() {
        let store = MemoryScheduleStore::new();
        let now = Utc::now();

        let past = store
            .insert(entry(now - chrono::Duration::minutes(5)))
            .await
            .unwrap();
        store
            .insert(entry(now + chrono::Duration::minutes(5)))
            .await
            .unwrap();

        let due = store.due_entries(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past);
    }

    #[tokio::test]
    async fn test_due_entries_sorted_oldest_first() {
        let store = MemoryScheduleStore::new();
        let now = Utc::now();

        let newer = store
            .insert(entry(now - chrono::Duration::minutes(1)))
            .await
            .unwrap();
        let older = store
            .insert(entry(now - chrono::Duration::minutes(10)))
            .await
            .unwrap();

        let due = store.due_entries(now).await.unwrap();
        assert_eq!(due[0].id, older);
        assert_eq!(due[1].id, newer);
    }

    #[tokio::test]
    async fn test_claim_is_single_shot() {
        let store = MemoryScheduleStore::new();
        let id = store.insert(entry(Utc::now())).await.unwrap();

        assert!(store.claim(id).await.unwrap());
        assert!(!store.claim(id).await.unwrap());
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_done_entries_are_not_due() {
        let store = MemoryScheduleStore::new();
        let now = Utc::now();
        let id = store
            .insert(entry(now - chrono::Duration::minutes(1)))
            .await
            .unwrap();

        store.claim(id).await.unwrap();
        store.mark_done(id).await.unwrap();

        assert!(store.due_entries(now).await.unwrap().is_empty());
        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Done);
        assert!(stored.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_failed_records_error() {
        let store = MemoryScheduleStore::new();
        let id = store.insert(entry(Utc::now())).await.unwrap();

        store.claim(id).await.unwrap();
        store.mark_failed(id, "boom").await.unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScheduleStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_cancel_only_pending() {
        let store = MemoryScheduleStore::new();
        let id = store.insert(entry(Utc::now())).await.unwrap();

        assert!(store.cancel(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());

        let id = store.insert(entry(Utc::now())).await.unwrap();
        store.claim(id).await.unwrap();
        assert!(!store.cancel(id).await.unwrap());
    }
}

//! Instance-owned engine statistics.
//!
//! Owned by the orchestrator and injected where needed; lifecycle is tied
//! to the engine's construction so tests never share counter state.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the dispatch engine
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Total dispatch attempts
    pub dispatched: AtomicU64,
    /// Dispatches where every channel succeeded
    pub delivered: AtomicU64,
    /// Dispatches where some but not all channels succeeded
    pub partially_delivered: AtomicU64,
    /// Dispatches where no channel succeeded
    pub failed: AtomicU64,
    /// Requests refused because they had expired
    pub expired: AtomicU64,
    /// Individual channel sends attempted
    pub channel_attempts: AtomicU64,
    /// Individual channel sends that failed
    pub channel_failures: AtomicU64,
}

impl EngineStats {
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            partially_delivered: self.partially_delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            channel_attempts: self.channel_attempts.load(Ordering::Relaxed),
            channel_failures: self.channel_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub dispatched: u64,
    pub delivered: u64,
    pub partially_delivered: u64,
    pub failed: u64,
    pub expired: u64,
    pub channel_attempts: u64,
    pub channel_failures: u64,
}

//! Cross-component integration tests
//!
//! These tests verify interactions between the orchestrator, preference
//! resolver, template renderer, delivery record store, and scheduler
//! without requiring any real transport provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use serde_json::json;

use renta_notify::channel::{AdapterRegistry, ChannelAdapter, ChannelMessage};
use renta_notify::config::{DispatchConfig, SchedulerConfig};
use renta_notify::dispatch::{LifecycleEvent, Orchestrator};
use renta_notify::notification::{
    Channel, ChannelResult, NotificationKind, NotificationRequest, NotificationStatus, Priority,
};
use renta_notify::preference::{
    MemoryPreferenceStore, PreferenceResolver, QuietHours, UserPreference,
};
use renta_notify::scheduler::{MemoryScheduleStore, ScheduleStatus, ScheduleStore, Scheduler};
use renta_notify::store::{DeliveryRecordStore, MemoryDeliveryStore};
use renta_notify::template::{seed_default_templates, MemoryTemplateStore, TemplateRenderer};

/// Adapter stub with a configurable delay and outcome
struct MockAdapter {
    channel: Channel,
    delay: Duration,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChannelAdapter for MockAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, _message: &ChannelMessage) -> ChannelResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            ChannelResult::failed(self.channel, "mock transport failure")
        } else {
            ChannelResult::ok(self.channel, Some("mock-id".to_string()))
        }
    }
}

/// One mock adapter definition: channel, delay, whether it fails
struct AdapterSpec(Channel, Duration, bool);

struct TestEnvironment {
    orchestrator: Arc<Orchestrator>,
    scheduler: Scheduler,
    records: Arc<MemoryDeliveryStore>,
    schedule_store: Arc<MemoryScheduleStore>,
    calls: HashMap<Channel, Arc<AtomicUsize>>,
}

async fn create_environment(
    specs: Vec<AdapterSpec>,
    preferences: Vec<UserPreference>,
) -> TestEnvironment {
    let mut adapters = AdapterRegistry::new();
    let mut calls = HashMap::new();

    for AdapterSpec(channel, delay, fail) in specs {
        let counter = Arc::new(AtomicUsize::new(0));
        calls.insert(channel, counter.clone());
        adapters.register(Arc::new(MockAdapter {
            channel,
            delay,
            fail,
            calls: counter,
        }));
    }

    let preference_store = Arc::new(MemoryPreferenceStore::new());
    for preference in preferences {
        preference_store.put(preference);
    }

    let template_store = Arc::new(MemoryTemplateStore::new());
    seed_default_templates(template_store.as_ref()).await.unwrap();

    let records = Arc::new(MemoryDeliveryStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        adapters,
        PreferenceResolver::new(preference_store),
        TemplateRenderer::new(template_store),
        records.clone(),
        DispatchConfig::default(),
    ));

    let schedule_store = Arc::new(MemoryScheduleStore::new());
    let scheduler = Scheduler::new(
        schedule_store.clone(),
        records.clone(),
        orchestrator.clone(),
        SchedulerConfig::default(),
    );

    TestEnvironment {
        orchestrator,
        scheduler,
        records,
        schedule_store,
        calls,
    }
}

fn instant_adapters(channels: &[Channel]) -> Vec<AdapterSpec> {
    channels
        .iter()
        .map(|&c| AdapterSpec(c, Duration::ZERO, false))
        .collect()
}

fn booking_request(recipient: &str) -> NotificationRequest {
    NotificationRequest::builder(NotificationKind::BookingConfirmed, recipient)
        .title("Booking confirmed")
        .message("Your booking is confirmed")
        .build()
}

// =============================================================================
// Dispatch Orchestrator
// =============================================================================

mod dispatch_tests {
    use super::*;

    #[tokio::test]
    async fn invalid_request_invokes_no_adapter() {
        let env = create_environment(
            instant_adapters(&[Channel::Email, Channel::Sms, Channel::Push]),
            vec![],
        )
        .await;

        let missing_title =
            NotificationRequest::builder(NotificationKind::SecurityAlert, "user-1")
                .message("body only")
                .channels(vec![Channel::Email, Channel::Sms, Channel::Push])
                .build();

        let result = env.orchestrator.dispatch(missing_title).await;
        assert!(result.is_err());

        for counter in env.calls.values() {
            assert_eq!(counter.load(Ordering::SeqCst), 0);
        }
        assert!(env.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_is_bounded_by_slowest_adapter_not_the_sum() {
        let delay = Duration::from_millis(200);
        let env = create_environment(
            vec![
                AdapterSpec(Channel::Email, delay, false),
                AdapterSpec(Channel::Sms, delay, false),
                AdapterSpec(Channel::Push, delay, false),
                AdapterSpec(Channel::Webhook, delay, false),
            ],
            vec![],
        )
        .await;

        let request = NotificationRequest::builder(NotificationKind::SecurityAlert, "user-1")
            .title("t")
            .message("m")
            .channels(vec![
                Channel::Email,
                Channel::Sms,
                Channel::Push,
                Channel::Webhook,
            ])
            .build();

        let started = tokio::time::Instant::now();
        let outcome = env.orchestrator.dispatch(request).await.unwrap();
        let elapsed = started.elapsed();

        assert!(outcome.success);
        assert_eq!(outcome.channel_results.len(), 4);
        // Sequential sends would take 4 * 200ms of virtual time
        assert!(elapsed >= delay);
        assert!(
            elapsed < delay * 2,
            "fan-out took {:?}, expected about {:?}",
            elapsed,
            delay
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_adapter_is_cut_off_at_the_deadline() {
        let env = create_environment(
            vec![
                AdapterSpec(Channel::Email, Duration::ZERO, false),
                AdapterSpec(Channel::Push, Duration::from_secs(120), false),
            ],
            vec![],
        )
        .await;

        let request = NotificationRequest::builder(NotificationKind::BookingConfirmed, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email, Channel::Push])
            .build();

        let started = tokio::time::Instant::now();
        let outcome = env.orchestrator.dispatch(request).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome.status, NotificationStatus::PartiallyDelivered);
        let push = outcome
            .channel_results
            .iter()
            .find(|r| r.channel == Channel::Push)
            .unwrap();
        assert!(push.error.as_deref().unwrap().contains("timed out"));
        // Bounded by the 10s default deadline, not the 120s adapter stall
        assert!(elapsed < Duration::from_secs(15));
    }

    #[tokio::test]
    async fn partial_success_yields_partially_delivered_with_all_results() {
        let env = create_environment(
            vec![
                AdapterSpec(Channel::Email, Duration::ZERO, false),
                AdapterSpec(Channel::Sms, Duration::ZERO, true),
                AdapterSpec(Channel::Push, Duration::ZERO, true),
            ],
            vec![],
        )
        .await;

        let request = NotificationRequest::builder(NotificationKind::SecurityAlert, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email, Channel::Sms, Channel::Push])
            .build();

        let outcome = env.orchestrator.dispatch(request).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.status, NotificationStatus::PartiallyDelivered);
        assert_eq!(outcome.channel_results.len(), 3);
        assert_eq!(
            outcome.channel_results.iter().filter(|r| r.success).count(),
            1
        );
        assert_eq!(outcome.errors.len(), 2);

        let record = env
            .records
            .get(outcome.notification_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, NotificationStatus::PartiallyDelivered);
        assert_eq!(record.channel_results.len(), 3);
        assert!(record.delivered_at.is_some());
    }

    #[tokio::test]
    async fn explicit_channels_override_stored_preferences() {
        let preference = UserPreference::new("user-1")
            .with_channel(Channel::Sms, false)
            .with_channel(Channel::Push, false);
        let env = create_environment(
            instant_adapters(&[Channel::Sms, Channel::Push]),
            vec![preference],
        )
        .await;

        let request = NotificationRequest::builder(NotificationKind::BookingConfirmed, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Sms, Channel::Push])
            .build();

        let outcome = env.orchestrator.dispatch(request).await.unwrap();

        assert!(outcome.success);
        assert_eq!(env.calls[&Channel::Sms].load(Ordering::SeqCst), 1);
        assert_eq!(env.calls[&Channel::Push].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn urgent_priority_bypasses_quiet_hours() {
        let all_day = QuietHours {
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            timezone: "UTC".to_string(),
        };
        let preference = UserPreference::new("user-1").with_quiet_hours(all_day);
        let env = create_environment(
            instant_adapters(&[Channel::Email, Channel::Sms, Channel::Push]),
            vec![preference],
        )
        .await;

        // Non-urgent: SMS and push suppressed by the quiet window
        let normal = NotificationRequest::builder(NotificationKind::SecurityAlert, "user-1")
            .title("t")
            .message("m")
            .build();
        env.orchestrator.dispatch(normal).await.unwrap();
        assert_eq!(env.calls[&Channel::Email].load(Ordering::SeqCst), 1);
        assert_eq!(env.calls[&Channel::Sms].load(Ordering::SeqCst), 0);
        assert_eq!(env.calls[&Channel::Push].load(Ordering::SeqCst), 0);

        // Urgent: quiet hours bypassed entirely
        let urgent = NotificationRequest::builder(NotificationKind::SecurityAlert, "user-1")
            .title("t")
            .message("m")
            .priority(Priority::Urgent)
            .build();
        env.orchestrator.dispatch(urgent).await.unwrap();
        assert_eq!(env.calls[&Channel::Email].load(Ordering::SeqCst), 2);
        assert_eq!(env.calls[&Channel::Sms].load(Ordering::SeqCst), 1);
        assert_eq!(env.calls[&Channel::Push].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn templated_dispatch_uses_seeded_template() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;

        let request = NotificationRequest::builder(NotificationKind::BookingConfirmed, "user-1")
            .title("fallback")
            .message("fallback")
            .template("booking_confirmed")
            .data(json!({
                "listing": "Harbor Loft",
                "start_date": "2025-07-01",
                "end_date": "2025-07-08",
            }))
            .channels(vec![Channel::Email])
            .build();

        let outcome = env.orchestrator.dispatch(request).await.unwrap();
        let record = env
            .records
            .get(outcome.notification_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.title, "Booking confirmed: Harbor Loft");
        assert!(record.message.contains("2025-07-01"));
        assert!(record.message.contains("2025-07-08"));
    }

    #[tokio::test]
    async fn bulk_dispatch_reports_per_request_outcomes() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;

        let requests = vec![
            NotificationRequest::builder(NotificationKind::PaymentReceived, "user-1")
                .title("t")
                .message("m")
                .channels(vec![Channel::Email])
                .build(),
            // Invalid: no message
            NotificationRequest::builder(NotificationKind::PaymentReceived, "user-2")
                .title("t")
                .channels(vec![Channel::Email])
                .build(),
            NotificationRequest::builder(NotificationKind::PaymentReceived, "user-3")
                .title("t")
                .message("m")
                .channels(vec![Channel::Email])
                .build(),
        ];

        let bulk = env.orchestrator.dispatch_bulk(requests).await;

        assert!(!bulk.success);
        assert_eq!(bulk.outcomes.len(), 3);
        assert!(bulk.outcomes[0].success);
        assert!(!bulk.outcomes[1].success);
        assert!(bulk.outcomes[2].success);
        // The invalid request left no record behind
        assert_eq!(env.records.len(), 2);
    }

    #[tokio::test]
    async fn lifecycle_events_mirror_outcomes() {
        let env = create_environment(
            vec![AdapterSpec(Channel::Email, Duration::ZERO, true)],
            vec![],
        )
        .await;
        let mut events = env.orchestrator.subscribe();

        let request = NotificationRequest::builder(NotificationKind::PaymentFailed, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email])
            .build();
        let outcome = env.orchestrator.dispatch(request).await.unwrap();

        match events.try_recv().unwrap() {
            LifecycleEvent::Failed {
                notification_id,
                errors,
            } => {
                assert_eq!(notification_id, outcome.notification_id);
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

// =============================================================================
// Scheduler
// =============================================================================

mod scheduler_tests {
    use super::*;

    #[tokio::test]
    async fn schedule_then_due_round_trip() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;

        let due_at = Utc::now() + chrono::Duration::minutes(10);
        let entry_id = env
            .scheduler
            .schedule(booking_request("user-1"), due_at)
            .await
            .unwrap();

        // Before the due time: nothing is due
        let before = env.scheduler.due_entries(Utc::now()).await.unwrap();
        assert!(before.is_empty());

        // At and after the due time: the entry shows up exactly once
        let after = env
            .scheduler
            .due_entries(due_at + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, entry_id);
        assert_eq!(after[0].status, ScheduleStatus::Pending);
    }

    #[tokio::test]
    async fn schedule_creates_scheduled_record() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;

        let due_at = Utc::now() + chrono::Duration::minutes(10);
        let entry_id = env
            .scheduler
            .schedule(booking_request("user-1"), due_at)
            .await
            .unwrap();

        let entry = env.schedule_store.get(entry_id).await.unwrap().unwrap();
        let record = env
            .records
            .get(entry.notification_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, NotificationStatus::Scheduled);
        assert_eq!(record.scheduled_at, Some(due_at));
    }

    #[tokio::test]
    async fn one_sweep_dispatches_each_due_entry_exactly_once() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;

        let overdue = Utc::now() - chrono::Duration::minutes(1);
        let request = NotificationRequest::builder(NotificationKind::BookingReminder, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email])
            .build();
        let entry_id = env.scheduler.schedule(request, overdue).await.unwrap();

        let first = env.scheduler.process_scheduled_notifications().await;
        assert_eq!(first.claimed, 1);
        assert_eq!(first.dispatched, 1);
        assert_eq!(first.failed, 0);
        assert_eq!(env.calls[&Channel::Email].load(Ordering::SeqCst), 1);

        let entry = env.schedule_store.get(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, ScheduleStatus::Done);

        let record = env
            .records
            .get(entry.notification_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, NotificationStatus::Delivered);

        // A second sweep must not re-dispatch a Done entry
        let second = env.scheduler.process_scheduled_notifications().await;
        assert_eq!(second.claimed, 0);
        assert_eq!(env.calls[&Channel::Email].load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failing_entry_does_not_abort_the_sweep() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;
        let overdue = Utc::now() - chrono::Duration::minutes(1);

        // This entry's dispatch errors: its template does not exist
        let broken = NotificationRequest::builder(NotificationKind::BookingReminder, "user-1")
            .title("t")
            .message("m")
            .template("does_not_exist")
            .channels(vec![Channel::Email])
            .build();
        let broken_id = env.scheduler.schedule(broken, overdue).await.unwrap();

        let healthy = NotificationRequest::builder(NotificationKind::BookingReminder, "user-2")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email])
            .build();
        let healthy_id = env.scheduler.schedule(healthy, overdue).await.unwrap();

        let outcome = env.scheduler.process_scheduled_notifications().await;
        assert_eq!(outcome.claimed, 2);
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(outcome.failed, 1);

        let broken_entry = env.schedule_store.get(broken_id).await.unwrap().unwrap();
        assert_eq!(broken_entry.status, ScheduleStatus::Failed);
        assert!(broken_entry.error.is_some());

        let healthy_entry = env.schedule_store.get(healthy_id).await.unwrap().unwrap();
        assert_eq!(healthy_entry.status, ScheduleStatus::Done);
    }

    #[tokio::test]
    async fn expired_scheduled_entry_is_refused_without_sending() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;
        let overdue = Utc::now() - chrono::Duration::minutes(10);

        let request = NotificationRequest::builder(NotificationKind::BookingReminder, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email])
            .expires_at(Utc::now() - chrono::Duration::minutes(5))
            .build();
        let entry_id = env.scheduler.schedule(request, overdue).await.unwrap();

        let outcome = env.scheduler.process_scheduled_notifications().await;
        assert_eq!(outcome.dispatched, 1);
        assert_eq!(env.calls[&Channel::Email].load(Ordering::SeqCst), 0);

        let entry = env.schedule_store.get(entry_id).await.unwrap().unwrap();
        let record = env
            .records
            .get(entry.notification_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, NotificationStatus::Expired);
    }

    #[tokio::test]
    async fn cancelled_entry_is_never_dispatched() {
        let env = create_environment(instant_adapters(&[Channel::Email]), vec![]).await;
        let overdue = Utc::now() - chrono::Duration::minutes(1);

        let request = NotificationRequest::builder(NotificationKind::BookingReminder, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email])
            .build();
        let entry_id = env.scheduler.schedule(request, overdue).await.unwrap();

        assert!(env.scheduler.cancel(entry_id).await.unwrap());

        let outcome = env.scheduler.process_scheduled_notifications().await;
        assert_eq!(outcome.claimed, 0);
        assert_eq!(env.calls[&Channel::Email].load(Ordering::SeqCst), 0);
    }
}

// =============================================================================
// Statistics
// =============================================================================

mod statistics_tests {
    use super::*;

    #[tokio::test]
    async fn record_store_aggregates_by_status_kind_and_channel() {
        let env = create_environment(
            vec![
                AdapterSpec(Channel::Email, Duration::ZERO, false),
                AdapterSpec(Channel::Sms, Duration::ZERO, true),
            ],
            vec![],
        )
        .await;

        let mixed = NotificationRequest::builder(NotificationKind::PaymentFailed, "user-1")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email, Channel::Sms])
            .build();
        env.orchestrator.dispatch(mixed).await.unwrap();

        let ok = NotificationRequest::builder(NotificationKind::PaymentReceived, "user-2")
            .title("t")
            .message("m")
            .channels(vec![Channel::Email])
            .build();
        env.orchestrator.dispatch(ok).await.unwrap();

        let stats = env.records.statistics(None).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.get("partially_delivered").copied(), Some(1));
        assert_eq!(stats.by_status.get("delivered").copied(), Some(1));
        assert_eq!(stats.by_channel.get("email").copied(), Some(2));
        assert_eq!(stats.by_channel.get("sms").copied(), Some(1));

        let scoped = env.records.statistics(Some("user-1")).await.unwrap();
        assert_eq!(scoped.total, 1);
        assert_eq!(scoped.by_kind.get("payment_failed").copied(), Some(1));

        let engine = env.orchestrator.stats();
        assert_eq!(engine.dispatched, 2);
        assert_eq!(engine.channel_attempts, 3);
        assert_eq!(engine.channel_failures, 1);
    }
}

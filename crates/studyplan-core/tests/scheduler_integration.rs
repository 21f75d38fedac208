//! Integration tests for the deadline scheduler.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use studyplan_core::{
    Alert, AlertFormatter, ChannelSink, DatabaseError, DeadlineScheduler, Dispatcher,
    ManualClock, MemoryPlanSource, MemoryRecordStore, NotificationRecord, PlanBatch, PlanSource,
    PlanSourceError, RecordStore, SchedulerConfig, SqliteRecordStore, StudyPlan,
};

fn deadline() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 15, 9, 0, 0).unwrap()
}

fn dispatcher() -> (Dispatcher, UnboundedReceiver<Alert>) {
    let (sink, rx) = ChannelSink::new();
    let dispatcher =
        Dispatcher::new(AlertFormatter::with_offset(FixedOffset::east_opt(0).unwrap()))
            .with_sink(sink);
    (dispatcher, rx)
}

fn drain(rx: &mut UnboundedReceiver<Alert>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    while let Ok(alert) = rx.try_recv() {
        out.push((alert.plan_id, alert.threshold_id));
    }
    out
}

fn pair(plan: &str, threshold: &str) -> (String, String) {
    (plan.to_string(), threshold.to_string())
}

/// Source that always fails.
struct DownSource;

#[async_trait]
impl PlanSource for DownSource {
    async fn fetch_active_plans(&self, _: &str) -> Result<PlanBatch, PlanSourceError> {
        Err(PlanSourceError::Status { status: 503 })
    }
}

/// Source that never answers in time.
struct HungSource;

#[async_trait]
impl PlanSource for HungSource {
    async fn fetch_active_plans(&self, _: &str) -> Result<PlanBatch, PlanSourceError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(PlanBatch::default())
    }
}

/// Source whose next answer is set by the test.
#[derive(Clone, Default)]
struct ScriptedSource {
    next: Arc<Mutex<PlanBatch>>,
}

impl ScriptedSource {
    fn answer(&self, batch: PlanBatch) {
        *self.next.lock().unwrap() = batch;
    }
}

#[async_trait]
impl PlanSource for ScriptedSource {
    async fn fetch_active_plans(&self, _: &str) -> Result<PlanBatch, PlanSourceError> {
        Ok(self.next.lock().unwrap().clone())
    }
}

/// Source that takes longer than a tick interval and records concurrency.
#[derive(Clone, Default)]
struct SlowSource {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[async_trait]
impl PlanSource for SlowSource {
    async fn fetch_active_plans(&self, _: &str) -> Result<PlanBatch, PlanSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_secs(150)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(PlanBatch::default())
    }
}

/// Memory store whose saves fail for one plan while `failing` is set.
struct FlakyStore {
    inner: MemoryRecordStore,
    bad_plan: String,
    failing: Arc<AtomicBool>,
}

impl RecordStore for FlakyStore {
    fn load(&self, plan_id: &str) -> Result<Option<NotificationRecord>, DatabaseError> {
        self.inner.load(plan_id)
    }

    fn save(&mut self, record: &NotificationRecord) -> Result<(), DatabaseError> {
        if record.plan_id == self.bad_plan && self.failing.load(Ordering::SeqCst) {
            return Err(DatabaseError::Locked);
        }
        self.inner.save(record)
    }

    fn delete(&mut self, plan_id: &str) -> Result<bool, DatabaseError> {
        self.inner.delete(plan_id)
    }

    fn list_known_plan_ids(&self) -> Result<BTreeSet<String>, DatabaseError> {
        self.inner.list_known_plan_ids()
    }
}

#[tokio::test]
async fn seventy_minute_plan_fires_each_threshold_once() {
    let source = MemoryPlanSource::new(vec![StudyPlan::new("p1", "physics", deadline())]);
    let clock = ManualClock::new(deadline() - Duration::minutes(70));
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1"),
        source,
        MemoryRecordStore::new(),
        dispatcher,
    )
    .with_clock(clock.clone());

    scheduler.tick_now().await.unwrap();
    assert!(drain(&mut rx).is_empty());

    clock.set(deadline() - Duration::minutes(59));
    scheduler.tick_now().await.unwrap();
    assert_eq!(drain(&mut rx), vec![pair("p1", "1h")]);

    for minutes in [40, 20, 11] {
        clock.set(deadline() - Duration::minutes(minutes));
        scheduler.tick_now().await.unwrap();
    }
    assert!(drain(&mut rx).is_empty());

    clock.set(deadline() - Duration::minutes(9));
    scheduler.tick_now().await.unwrap();
    assert_eq!(drain(&mut rx), vec![pair("p1", "10m")]);

    for minutes in [5, 1] {
        clock.set(deadline() - Duration::minutes(minutes));
        scheduler.tick_now().await.unwrap();
    }
    clock.set(deadline() + Duration::minutes(1));
    scheduler.tick_now().await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn offline_gap_fires_both_thresholds_in_order() {
    let source = MemoryPlanSource::new(vec![StudyPlan::new("p1", "physics", deadline())]);
    let clock = ManualClock::new(deadline() - Duration::minutes(65));
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1"),
        source,
        MemoryRecordStore::new(),
        dispatcher,
    )
    .with_clock(clock.clone());

    scheduler.tick_now().await.unwrap();
    assert!(drain(&mut rx).is_empty());

    clock.set(deadline() - Duration::minutes(5));
    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.fired_for("p1"), vec!["1h", "10m"]);
    assert_eq!(drain(&mut rx), vec![pair("p1", "1h"), pair("p1", "10m")]);
}

#[tokio::test]
async fn scheduler_offline_across_deadline_fires_nothing() {
    let source = MemoryPlanSource::new(vec![StudyPlan::new("p1", "physics", deadline())]);
    let clock = ManualClock::new(deadline() + Duration::minutes(3));
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1"),
        source,
        MemoryRecordStore::new(),
        dispatcher,
    )
    .with_clock(clock);

    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.evaluated, 1);
    assert!(report.upcoming.is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn inactive_plan_is_pruned_and_readded_fresh() {
    let plan = StudyPlan::new("p1", "physics", deadline());
    let source = MemoryPlanSource::new(vec![plan.clone()]);
    let clock = ManualClock::new(deadline() - Duration::minutes(30));
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1"),
        source.clone(),
        MemoryRecordStore::new(),
        dispatcher,
    )
    .with_clock(clock.clone());

    scheduler.tick_now().await.unwrap();
    assert_eq!(drain(&mut rx), vec![pair("p1", "1h")]);

    let mut inactive = plan.clone();
    inactive.active = false;
    source.upsert(inactive);
    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.pruned, vec!["p1".to_string()]);
    assert!(scheduler.store().load("p1").unwrap().is_none());

    source.upsert(plan);
    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.fired_for("p1"), vec!["1h"]);
    assert_eq!(drain(&mut rx), vec![pair("p1", "1h")]);
}

#[tokio::test]
async fn fetch_failure_leaves_records_untouched() {
    let mut store = MemoryRecordStore::new();
    store
        .save(&NotificationRecord::for_plan(&StudyPlan::new(
            "gone",
            "art",
            deadline(),
        )))
        .unwrap();
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler =
        DeadlineScheduler::new(SchedulerConfig::new("u1"), DownSource, store, dispatcher)
            .with_clock(ManualClock::new(deadline() - Duration::minutes(5)));

    let err = scheduler.tick_now().await.unwrap_err();
    assert!(matches!(err, PlanSourceError::Status { status: 503 }));
    assert!(scheduler.store().load("gone").unwrap().is_some());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out() {
    let (dispatcher, _rx) = dispatcher();
    let config =
        SchedulerConfig::new("u1").with_fetch_timeout(std::time::Duration::from_secs(5));
    let mut scheduler =
        DeadlineScheduler::new(config, HungSource, MemoryRecordStore::new(), dispatcher);

    let err = scheduler.tick_now().await.unwrap_err();
    assert!(matches!(err, PlanSourceError::Timeout { timeout_secs: 5 }));
}

#[tokio::test]
async fn failed_save_skips_dispatch_for_that_plan_only() {
    let failing = Arc::new(AtomicBool::new(true));
    let store = FlakyStore {
        inner: MemoryRecordStore::new(),
        bad_plan: "bad".into(),
        failing: failing.clone(),
    };
    let source = MemoryPlanSource::new(vec![
        StudyPlan::new("bad", "physics", deadline()),
        StudyPlan::new("good", "chemistry", deadline()),
    ]);
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler =
        DeadlineScheduler::new(SchedulerConfig::new("u1"), source, store, dispatcher)
            .with_clock(ManualClock::new(deadline() - Duration::minutes(30)));

    let report = scheduler.tick_now().await.unwrap();
    assert_eq!(report.failed_plans, vec!["bad".to_string()]);
    assert_eq!(drain(&mut rx), vec![pair("good", "1h")]);

    failing.store(false, Ordering::SeqCst);
    let report = scheduler.tick_now().await.unwrap();
    assert!(report.failed_plans.is_empty());
    assert_eq!(drain(&mut rx), vec![pair("bad", "1h")]);
}

#[tokio::test]
async fn fired_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("studyplan.db");
    let source = MemoryPlanSource::new(vec![StudyPlan::new("p1", "physics", deadline())]);
    let clock = ManualClock::new(deadline() - Duration::minutes(59));

    {
        let (dispatcher, mut rx) = dispatcher();
        let mut scheduler = DeadlineScheduler::new(
            SchedulerConfig::new("u1"),
            source.clone(),
            SqliteRecordStore::open_at(&db_path, "u1").unwrap(),
            dispatcher,
        )
        .with_clock(clock.clone());
        scheduler.tick_now().await.unwrap();
        assert_eq!(drain(&mut rx), vec![pair("p1", "1h")]);
    }

    clock.set(deadline() - Duration::minutes(58));
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1"),
        source,
        SqliteRecordStore::open_at(&db_path, "u1").unwrap(),
        dispatcher,
    )
    .with_clock(clock);
    let report = scheduler.tick_now().await.unwrap();
    assert!(report.fired.is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_runs_first_tick_and_stop_returns_scheduler() {
    let source = MemoryPlanSource::new(vec![StudyPlan::new("p1", "physics", deadline())]);
    let (dispatcher, mut rx) = dispatcher();
    let scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1").with_tick_interval(std::time::Duration::from_secs(60)),
        source,
        MemoryRecordStore::new(),
        dispatcher,
    )
    .with_clock(ManualClock::new(deadline() - Duration::minutes(30)));

    let handle = scheduler.start();
    let alert = rx.recv().await.unwrap();
    assert_eq!(alert.threshold_id, "1h");
    assert_eq!(alert.title, "Exam in 1 Hour!");

    // Several more intervals elapse without new alerts.
    tokio::time::sleep(std::time::Duration::from_secs(300)).await;
    assert!(rx.try_recv().is_err());

    let scheduler = handle.stop().await.unwrap();
    assert!(scheduler.store().load("p1").unwrap().unwrap().has_fired("1h"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_token_stops_the_task() {
    let (dispatcher, _rx) = dispatcher();
    let scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1"),
        MemoryPlanSource::default(),
        MemoryRecordStore::new(),
        dispatcher,
    );

    let handle = scheduler.start();
    handle.cancellation_token().cancel();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    assert!(handle.is_finished());
    assert!(handle.stop().await.is_ok());
}

#[tokio::test]
async fn unreadable_plan_keeps_its_record() {
    let plan = StudyPlan::new("p1", "physics", deadline());
    let source = ScriptedSource::default();
    source.answer(vec![plan.clone()].into());
    let (dispatcher, mut rx) = dispatcher();
    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::new("u1"),
        source.clone(),
        MemoryRecordStore::new(),
        dispatcher,
    )
    .with_clock(ManualClock::new(deadline() - Duration::minutes(30)));

    scheduler.tick_now().await.unwrap();
    assert_eq!(drain(&mut rx), vec![pair("p1", "1h")]);

    source.answer(PlanBatch {
        plans: Vec::new(),
        unreadable: ["p1".to_string()].into_iter().collect(),
    });
    let report = scheduler.tick_now().await.unwrap();
    assert!(report.pruned.is_empty());
    assert_eq!(report.unreadable, vec!["p1".to_string()]);
    assert!(scheduler.store().load("p1").unwrap().unwrap().has_fired("1h"));

    source.answer(vec![plan].into());
    let report = scheduler.tick_now().await.unwrap();
    assert!(report.fired.is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_ticks_never_overlap_and_missed_ticks_are_skipped() {
    let source = SlowSource::default();
    let (dispatcher, _rx) = dispatcher();
    let config = SchedulerConfig::new("u1")
        .with_tick_interval(std::time::Duration::from_secs(60))
        .with_fetch_timeout(std::time::Duration::from_secs(300));
    let scheduler =
        DeadlineScheduler::new(config, source.clone(), MemoryRecordStore::new(), dispatcher);

    // Each fetch takes 150s, so fetches start at 0, 150, 300 and 450s. Ticks
    // due while a fetch runs are dropped rather than replayed.
    let handle = scheduler.start();
    tokio::time::sleep(std::time::Duration::from_secs(520)).await;
    handle.stop().await.unwrap();

    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    assert_eq!(source.in_flight.load(Ordering::SeqCst), 0);
}

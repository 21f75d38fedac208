use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{FiredAlert, SchedulerConfig, TickReport, UpcomingAlert, MIN_TICK_INTERVAL};
use crate::alerts::{evaluate, next_due, Dispatcher, ThresholdSet};
use crate::clock::{Clock, SystemClock};
use crate::error::{DatabaseError, PlanSourceError};
use crate::plan::StudyPlan;
use crate::records::{NotificationRecord, RecordStore};
use crate::source::PlanSource;

/// Periodic driver of threshold evaluation for one observer.
///
/// Owns its record store; nothing else writes to it while the scheduler
/// exists. Call [`tick_now`](Self::tick_now) for a single synchronous pass,
/// or [`start`](Self::start) to run on a timer.
pub struct DeadlineScheduler {
    config: SchedulerConfig,
    source: Box<dyn PlanSource>,
    store: Box<dyn RecordStore>,
    dispatcher: Dispatcher,
    thresholds: ThresholdSet,
    clock: Box<dyn Clock>,
}

impl DeadlineScheduler {
    pub fn new(
        config: SchedulerConfig,
        source: impl PlanSource + 'static,
        store: impl RecordStore + 'static,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            config,
            source: Box::new(source),
            store: Box::new(store),
            dispatcher,
            thresholds: ThresholdSet::default(),
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSet) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn store(&self) -> &dyn RecordStore {
        &*self.store
    }

    /// Run one tick.
    ///
    /// # Errors
    /// Returns an error if the plan fetch fails or times out. No record is
    /// touched in that case. Per-plan store failures do not fail the tick;
    /// they are listed in [`TickReport::failed_plans`].
    pub async fn tick_now(&mut self) -> Result<TickReport, PlanSourceError> {
        let observer_id = self.config.observer_id.clone();
        let timeout = self.config.fetch_timeout;

        let fetched =
            tokio::time::timeout(timeout, self.source.fetch_active_plans(&observer_id)).await;
        let batch = match fetched {
            Ok(result) => result?,
            Err(_) => {
                return Err(PlanSourceError::Timeout {
                    timeout_secs: timeout.as_secs(),
                })
            }
        };

        let now = self.clock.now();
        let mut report = TickReport::new(now);
        let mut active_ids = BTreeSet::new();

        for plan in batch.plans.iter().filter(|p| p.active) {
            if !active_ids.insert(plan.id.clone()) {
                tracing::warn!(plan_id = %plan.id, "Duplicate plan id in fetch result, ignoring");
                continue;
            }
            report.evaluated += 1;

            if let Err(e) = self.process_plan(plan, now, &mut report) {
                tracing::warn!(
                    observer_id = %observer_id,
                    plan_id = %plan.id,
                    error = %e,
                    "Skipping plan this tick",
                );
                report.failed_plans.push(plan.id.clone());
            }
        }

        for plan_id in &batch.unreadable {
            if active_ids.insert(plan_id.clone()) {
                tracing::warn!(plan_id = %plan_id, "Plan unreadable this tick, keeping its record");
                report.unreadable.push(plan_id.clone());
            }
        }

        self.prune(&active_ids, &mut report);

        tracing::debug!(
            observer_id = %observer_id,
            evaluated = report.evaluated,
            fired = report.fired.len(),
            pruned = report.pruned.len(),
            failed = report.failed_plans.len(),
            "Tick complete",
        );
        Ok(report)
    }

    /// Evaluate one plan, persist its record, then dispatch.
    ///
    /// The record is saved before any alert is dispatched, so a crash in
    /// between can only lose an alert, never repeat one.
    fn process_plan(
        &mut self,
        plan: &StudyPlan,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), DatabaseError> {
        let (mut record, is_new) = match self.store.load(&plan.id)? {
            Some(record) => (record, false),
            None => (NotificationRecord::for_plan(plan), true),
        };

        let newly_fired = evaluate(now, plan, record.fired(), &self.thresholds);

        let refreshed = record.refresh_from(plan);
        if refreshed && !is_new {
            tracing::debug!(plan_id = %plan.id, "Plan subject or deadline changed");
        }
        let grew = record.mark_fired(newly_fired.iter().map(|t| t.id.clone()));

        if is_new || refreshed || grew {
            self.store.save(&record)?;
        }

        for threshold in &newly_fired {
            let delivered = self.dispatcher.dispatch(threshold, plan, now);
            tracing::info!(
                plan_id = %plan.id,
                subject = %plan.subject,
                threshold = %threshold.id,
                delivered,
                "Deadline alert dispatched",
            );
            report.fired.push(FiredAlert {
                plan_id: plan.id.clone(),
                threshold_id: threshold.id.clone(),
                delivered,
            });
        }

        if let Some((at, threshold)) = next_due(now, plan, record.fired(), &self.thresholds) {
            report.upcoming.push(UpcomingAlert {
                plan_id: plan.id.clone(),
                threshold_id: threshold.id,
                at,
            });
        }

        Ok(())
    }

    /// Delete records of plans that are neither active nor unreadable.
    fn prune(&mut self, active_ids: &BTreeSet<String>, report: &mut TickReport) {
        let known = match self.store.list_known_plan_ids() {
            Ok(known) => known,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list notification records, skipping prune");
                return;
            }
        };

        for plan_id in known.difference(active_ids) {
            match self.store.delete(plan_id) {
                Ok(_) => {
                    tracing::info!(plan_id = %plan_id, "Pruned record of inactive plan");
                    report.pruned.push(plan_id.clone());
                }
                Err(e) => {
                    tracing::warn!(plan_id = %plan_id, error = %e, "Failed to prune record");
                }
            }
        }
    }

    /// Run ticks until `cancel` fires. The first tick runs immediately.
    ///
    /// Cancellation is only observed between ticks; a tick in progress
    /// always completes.
    pub async fn run(&mut self, cancel: CancellationToken) {
        let interval = self.config.tick_interval.max(MIN_TICK_INTERVAL);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            observer_id = %self.config.observer_id,
            interval_secs = interval.as_secs(),
            thresholds = self.thresholds.len(),
            "Deadline scheduler started",
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(observer_id = %self.config.observer_id, "Deadline scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_now().await {
                        tracing::warn!(
                            observer_id = %self.config.observer_id,
                            error = %e,
                            "Tick aborted, will retry next tick",
                        );
                    }
                }
            }
        }
    }

    /// Spawn the scheduler on the current Tokio runtime.
    pub fn start(mut self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            self.run(token).await;
            self
        });
        SchedulerHandle { cancel, join }
    }
}

/// Control handle for a running scheduler.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<DeadlineScheduler>,
}

impl SchedulerHandle {
    /// Stop the timer and wait for the current tick to finish. Returns the
    /// scheduler so it can be started again.
    ///
    /// # Errors
    /// Returns an error if the scheduler task panicked.
    pub async fn stop(self) -> Result<DeadlineScheduler, JoinError> {
        self.cancel.cancel();
        self.join.await
    }

    /// Token that stops the scheduler when cancelled, e.g. on logout.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

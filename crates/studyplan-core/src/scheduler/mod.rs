//! Deadline scheduler.
//!
//! Drives periodic evaluation of an observer's study plans:
//!
//! ```text
//! tick -> fetch plans -> evaluate (per plan) -> save record -> dispatch alerts
//!      -> prune records of plans that are no longer active
//! ```
//!
//! One scheduler runs per observer. Ticks never overlap: a single task runs
//! each tick to completion before waiting for the next, and ticks missed in
//! the meantime are skipped rather than queued.

mod engine;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::Config;

pub use engine::{DeadlineScheduler, SchedulerHandle};

/// Smallest tick interval the timer accepts.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Per-observer scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub observer_id: String,
    pub tick_interval: Duration,
    pub fetch_timeout: Duration,
}

impl SchedulerConfig {
    /// Defaults: one tick per minute, ten second fetch timeout.
    pub fn new(observer_id: impl Into<String>) -> Self {
        Self {
            observer_id: observer_id.into(),
            tick_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &Config, observer_id: impl Into<String>) -> Self {
        Self {
            observer_id: observer_id.into(),
            tick_interval: config.tick_interval(),
            fetch_timeout: config.fetch_timeout(),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// One alert raised during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredAlert {
    pub plan_id: String,
    pub threshold_id: String,
    /// Number of sinks that presented the alert.
    pub delivered: usize,
}

/// The next threshold still ahead for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingAlert {
    pub plan_id: String,
    pub threshold_id: String,
    pub at: DateTime<Utc>,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    /// Active plans evaluated.
    pub evaluated: usize,
    pub fired: Vec<FiredAlert>,
    pub upcoming: Vec<UpcomingAlert>,
    /// Plan ids whose records were deleted.
    pub pruned: Vec<String>,
    /// Plan ids skipped because their record could not be loaded or saved.
    pub failed_plans: Vec<String>,
    /// Plan ids the source could not read; their records are kept.
    pub unreadable: Vec<String>,
}

impl TickReport {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            evaluated: 0,
            fired: Vec::new(),
            upcoming: Vec::new(),
            pruned: Vec::new(),
            failed_plans: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    /// Threshold ids fired for one plan, in dispatch order.
    pub fn fired_for(&self, plan_id: &str) -> Vec<&str> {
        self.fired
            .iter()
            .filter(|f| f.plan_id == plan_id)
            .map(|f| f.threshold_id.as_str())
            .collect()
    }
}

//! # Study Plan Core Library
//!
//! This library provides the deadline alert subsystem for the study planner.
//! It watches an observer's active study plans and raises an alert once per
//! configured threshold ("1 hour before", "10 minutes before") per plan.
//! A standalone CLI drives the same library the web host embeds.
//!
//! ## Architecture
//!
//! - **Alerts**: Threshold configuration and the pure threshold evaluator
//! - **Records**: Durable per-plan record of which thresholds already fired
//! - **Scheduler**: A tick-driven task that fetches plans, evaluates them,
//!   persists records and dispatches alerts
//! - **Source**: Plan store collaborators (HTTP API, JSON file)
//! - **Storage**: TOML-based configuration and data directory
//!
//! ## Key Components
//!
//! - [`evaluate`]: Pure threshold evaluation
//! - [`DeadlineScheduler`]: Periodic evaluation driver
//! - [`SqliteRecordStore`]: Notification record persistence
//! - [`Dispatcher`]: Alert construction and delivery to sinks
//! - [`Config`]: Application configuration management

pub mod alerts;
pub mod clock;
pub mod error;
pub mod plan;
pub mod records;
pub mod scheduler;
pub mod source;
pub mod storage;

pub use alerts::{
    evaluate, next_due, Alert, AlertCue, AlertFormatter, AlertSink, AlertThreshold, ChannelSink,
    Dispatcher, LogSink, ThresholdSet,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{
    ConfigError, CoreError, DatabaseError, DispatchError, PlanSourceError, ValidationError,
};
pub use plan::StudyPlan;
pub use records::{MemoryRecordStore, NotificationRecord, RecordStore, SqliteRecordStore};
pub use scheduler::{
    DeadlineScheduler, FiredAlert, SchedulerConfig, SchedulerHandle, TickReport, UpcomingAlert,
};
pub use source::{FilePlanSource, HttpPlanSource, MemoryPlanSource, PlanBatch, PlanSource};
pub use storage::Config;

//! Notification records: which thresholds already fired for which plan.

mod memory;
mod sqlite;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::plan::StudyPlan;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// Alert state for one plan.
///
/// `fired` only grows. No method removes an id; a fired threshold is only
/// forgotten when the whole record is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub plan_id: String,
    pub subject: String,
    pub exam_deadline: DateTime<Utc>,
    fired: BTreeSet<String>,
}

impl NotificationRecord {
    /// Fresh record with nothing fired.
    pub fn for_plan(plan: &StudyPlan) -> Self {
        Self {
            plan_id: plan.id.clone(),
            subject: plan.subject.clone(),
            exam_deadline: plan.exam_deadline,
            fired: BTreeSet::new(),
        }
    }

    /// Rebuild a record read back from storage.
    pub fn from_parts(
        plan_id: String,
        subject: String,
        exam_deadline: DateTime<Utc>,
        fired: BTreeSet<String>,
    ) -> Self {
        Self {
            plan_id,
            subject,
            exam_deadline,
            fired,
        }
    }

    pub fn fired(&self) -> &BTreeSet<String> {
        &self.fired
    }

    pub fn has_fired(&self, threshold_id: &str) -> bool {
        self.fired.contains(threshold_id)
    }

    /// Add threshold ids. Returns true if any id was new.
    pub fn mark_fired<I, S>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut changed = false;
        for id in ids {
            changed |= self.fired.insert(id.into());
        }
        changed
    }

    /// Copy subject and deadline from the plan. Fired ids are untouched even
    /// if the deadline moved. Returns true if anything changed.
    pub fn refresh_from(&mut self, plan: &StudyPlan) -> bool {
        let changed = self.subject != plan.subject || self.exam_deadline != plan.exam_deadline;
        if changed {
            self.subject.clone_from(&plan.subject);
            self.exam_deadline = plan.exam_deadline;
        }
        changed
    }
}

/// Durable per-observer storage of notification records.
///
/// A single scheduler owns its store and never calls it concurrently, so
/// implementations need atomic per-plan saves but no locking of their own.
pub trait RecordStore: Send {
    fn load(&self, plan_id: &str) -> Result<Option<NotificationRecord>, DatabaseError>;

    /// Persist the record. Must be durable when it returns.
    fn save(&mut self, record: &NotificationRecord) -> Result<(), DatabaseError>;

    /// Remove the record. Returns true if one existed.
    fn delete(&mut self, plan_id: &str) -> Result<bool, DatabaseError>;

    fn list_known_plan_ids(&self) -> Result<BTreeSet<String>, DatabaseError>;
}

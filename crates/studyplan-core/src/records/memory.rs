use std::collections::{BTreeSet, HashMap};

use super::{NotificationRecord, RecordStore};
use crate::error::DatabaseError;

/// Non-durable record store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: HashMap<String, NotificationRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self, plan_id: &str) -> Result<Option<NotificationRecord>, DatabaseError> {
        Ok(self.records.get(plan_id).cloned())
    }

    fn save(&mut self, record: &NotificationRecord) -> Result<(), DatabaseError> {
        // Union with what is stored so a stale copy cannot drop fired ids.
        let merged = match self.records.get(&record.plan_id) {
            Some(existing) => {
                let mut merged = record.clone();
                merged.mark_fired(existing.fired().iter().cloned());
                merged
            }
            None => record.clone(),
        };
        self.records.insert(record.plan_id.clone(), merged);
        Ok(())
    }

    fn delete(&mut self, plan_id: &str) -> Result<bool, DatabaseError> {
        Ok(self.records.remove(plan_id).is_some())
    }

    fn list_known_plan_ids(&self) -> Result<BTreeSet<String>, DatabaseError> {
        Ok(self.records.keys().cloned().collect())
    }
}

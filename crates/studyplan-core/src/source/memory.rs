use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{PlanBatch, PlanSource};
use crate::error::PlanSourceError;
use crate::plan::StudyPlan;

/// In-process plan list shared with the host. Clones see the same plans.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlanSource {
    plans: Arc<Mutex<Vec<StudyPlan>>>,
}

impl MemoryPlanSource {
    pub fn new(plans: Vec<StudyPlan>) -> Self {
        Self {
            plans: Arc::new(Mutex::new(plans)),
        }
    }

    /// Insert or replace a plan by id.
    pub fn upsert(&self, plan: StudyPlan) {
        let mut plans = self.lock();
        match plans.iter_mut().find(|p| p.id == plan.id) {
            Some(existing) => *existing = plan,
            None => plans.push(plan),
        }
    }

    pub fn remove(&self, plan_id: &str) -> bool {
        let mut plans = self.lock();
        let before = plans.len();
        plans.retain(|p| p.id != plan_id);
        plans.len() != before
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StudyPlan>> {
        self.plans.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PlanSource for MemoryPlanSource {
    async fn fetch_active_plans(
        &self,
        _observer_id: &str,
    ) -> Result<PlanBatch, PlanSourceError> {
        Ok(self.lock().clone().into())
    }
}

//! Plan store collaborators.
//!
//! The alert subsystem never owns study plans. It asks a [`PlanSource`] for
//! the observer's plans once per tick and treats any failure as transient.

mod file;
mod http;
mod memory;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PlanSourceError;
use crate::plan::StudyPlan;

pub use file::FilePlanSource;
pub use http::{parse_exam_date, HttpPlanSource};
pub use memory::MemoryPlanSource;

/// Plans returned by one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanBatch {
    pub plans: Vec<StudyPlan>,
    /// Active plans the source saw but could not read this time. The
    /// scheduler neither evaluates nor prunes them.
    pub unreadable: BTreeSet<String>,
}

impl From<Vec<StudyPlan>> for PlanBatch {
    fn from(plans: Vec<StudyPlan>) -> Self {
        Self {
            plans,
            unreadable: BTreeSet::new(),
        }
    }
}

/// External store of study plans.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Plans belonging to `observer_id`. Implementations may return inactive
    /// plans; the scheduler filters them out.
    async fn fetch_active_plans(&self, observer_id: &str) -> Result<PlanBatch, PlanSourceError>;
}

#[async_trait]
impl<T: PlanSource + ?Sized> PlanSource for Arc<T> {
    async fn fetch_active_plans(
        &self,
        observer_id: &str,
    ) -> Result<PlanBatch, PlanSourceError> {
        (**self).fetch_active_plans(observer_id).await
    }
}

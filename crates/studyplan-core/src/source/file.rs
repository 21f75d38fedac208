use std::path::PathBuf;

use async_trait::async_trait;

use super::{PlanBatch, PlanSource};
use crate::error::PlanSourceError;
use crate::plan::StudyPlan;

/// Reads plans from a JSON array of [`StudyPlan`] on disk.
///
/// The file is re-read every tick, so edits are picked up without a restart.
/// It holds a single observer's plans; the observer id is ignored.
#[derive(Debug, Clone)]
pub struct FilePlanSource {
    path: PathBuf,
}

impl FilePlanSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl PlanSource for FilePlanSource {
    async fn fetch_active_plans(
        &self,
        _observer_id: &str,
    ) -> Result<PlanBatch, PlanSourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| PlanSourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        let plans: Vec<StudyPlan> = serde_json::from_str(&content)?;
        Ok(plans.into())
    }
}

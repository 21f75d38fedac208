use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A study plan as seen by the alert subsystem.
///
/// Owned by the external plan store; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPlan {
    pub id: String,
    pub subject: String,
    pub exam_deadline: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl StudyPlan {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        exam_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            exam_deadline,
            active: true,
        }
    }

    /// Time left until the exam. Negative once the deadline has passed.
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.exam_deadline - now
    }
}

//! Alert threshold configuration.
//!
//! A threshold is a lead time before an exam deadline at which one alert
//! fires. The set is fixed at startup and kept ordered from the furthest
//! lead time to the nearest.

use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertThreshold {
    /// Stable identifier persisted in notification records.
    pub id: String,
    /// Minutes before the deadline at which the threshold is crossed.
    pub lead_minutes: u32,
    /// Human-readable lead time, e.g. "1 Hour".
    pub label: String,
    /// Urgent alerts use the short time format and ask for attention.
    #[serde(default)]
    pub urgent: bool,
}

impl AlertThreshold {
    pub fn new(id: impl Into<String>, lead_minutes: u32, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lead_minutes,
            label: label.into(),
            urgent: false,
        }
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    pub fn lead(&self) -> Duration {
        Duration::minutes(i64::from(self.lead_minutes))
    }
}

/// Validated, ordered set of thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ThresholdSet {
    thresholds: Vec<AlertThreshold>,
}

impl ThresholdSet {
    /// Build a set, sorting by descending lead time.
    ///
    /// # Errors
    /// Returns an error if the list is empty, an id or lead time repeats,
    /// or a lead time is zero.
    pub fn new(mut thresholds: Vec<AlertThreshold>) -> Result<Self, ValidationError> {
        if thresholds.is_empty() {
            return Err(ValidationError::EmptyCollection("thresholds".into()));
        }

        let mut ids = HashSet::new();
        let mut leads = HashSet::new();
        for t in &thresholds {
            if t.id.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "thresholds.id".into(),
                    message: "must not be empty".into(),
                });
            }
            if t.lead_minutes == 0 {
                return Err(ValidationError::InvalidValue {
                    field: format!("thresholds.{}.lead_minutes", t.id),
                    message: "must be greater than zero".into(),
                });
            }
            if !ids.insert(t.id.as_str()) {
                return Err(ValidationError::Duplicate {
                    kind: "threshold id".into(),
                    id: t.id.clone(),
                });
            }
            if !leads.insert(t.lead_minutes) {
                return Err(ValidationError::Duplicate {
                    kind: "threshold lead time".into(),
                    id: t.lead_minutes.to_string(),
                });
            }
        }

        thresholds.sort_by(|a, b| b.lead_minutes.cmp(&a.lead_minutes));
        Ok(Self { thresholds })
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertThreshold> {
        self.thresholds.iter()
    }

    pub fn get(&self, id: &str) -> Option<&AlertThreshold> {
        self.thresholds.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn as_slice(&self) -> &[AlertThreshold] {
        &self.thresholds
    }
}

impl Default for ThresholdSet {
    /// One hour and ten minutes before the exam.
    fn default() -> Self {
        Self {
            thresholds: vec![
                AlertThreshold::new("1h", 60, "1 Hour"),
                AlertThreshold::new("10m", 10, "10 Minutes").urgent(),
            ],
        }
    }
}

impl<'de> Deserialize<'de> for ThresholdSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let thresholds = Vec::<AlertThreshold>::deserialize(deserializer)?;
        ThresholdSet::new(thresholds).map_err(serde::de::Error::custom)
    }
}

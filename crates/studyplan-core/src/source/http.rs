//! Plan source backed by the study planner web API.
//!
//! `GET {base_url}/api/study-plan?userId={observer}` answers with
//! `{ "plans": [ { "_id", "overview": { "subject", "examDate" }, "isActive" } ] }`.
//! `examDate` comes from a browser date-time input and usually has no offset,
//! so naive values are read in the observer's local time zone.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use url::Url;

use super::{PlanBatch, PlanSource};
use crate::error::PlanSourceError;
use crate::plan::StudyPlan;

#[derive(Debug, Deserialize)]
struct PlansResponse {
    #[serde(default)]
    plans: Vec<WirePlan>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePlan {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    overview: Option<WireOverview>,
    #[serde(default = "default_true")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOverview {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    exam_date: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Parse an `examDate` value.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (read in `tz`) and
/// `YYYY-MM-DD` (midnight in `tz`). Returns `None` for anything else or for
/// local times skipped by a DST transition.
pub fn parse_exam_date<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fetches plans from the web API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPlanSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPlanSource {
    /// # Errors
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(base_url: &str) -> Result<Self, PlanSourceError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    fn plans_url(&self, observer_id: &str) -> Result<Url, PlanSourceError> {
        let mut url = self.base_url.join("api/study-plan")?;
        url.query_pairs_mut().append_pair("userId", observer_id);
        Ok(url)
    }

    fn convert(wire: WirePlan) -> Option<StudyPlan> {
        let Some(overview) = wire.overview else {
            tracing::warn!(plan_id = %wire.id, "Plan has no overview, skipping");
            return None;
        };
        let Some(raw) = overview.exam_date.as_deref() else {
            tracing::warn!(plan_id = %wire.id, "Plan missing exam date, skipping");
            return None;
        };
        let Some(exam_deadline) = parse_exam_date(raw, &Local) else {
            tracing::warn!(plan_id = %wire.id, exam_date = raw, "Unparseable exam date, skipping");
            return None;
        };

        Some(StudyPlan {
            id: wire.id,
            subject: overview.subject,
            exam_deadline,
            active: wire.is_active,
        })
    }
}

#[async_trait]
impl PlanSource for HttpPlanSource {
    async fn fetch_active_plans(
        &self,
        observer_id: &str,
    ) -> Result<PlanBatch, PlanSourceError> {
        let url = self.plans_url(observer_id)?;
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PlanSourceError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        let parsed: PlansResponse = serde_json::from_str(&body)?;

        let mut batch = PlanBatch::default();
        for wire in parsed.plans {
            let (id, active) = (wire.id.clone(), wire.is_active);
            match Self::convert(wire) {
                Some(plan) => batch.plans.push(plan),
                None if active => {
                    batch.unreadable.insert(id);
                }
                None => {}
            }
        }
        Ok(batch)
    }
}

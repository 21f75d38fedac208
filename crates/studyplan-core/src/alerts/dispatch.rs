//! Notification dispatch.
//!
//! Turns a crossed threshold into an [`Alert`] and hands it to every
//! registered [`AlertSink`]. The host renders alerts with whatever it has
//! (desktop notification, in-app toast, terminal bell). Presentation is
//! best effort: a sink failure is logged and never retried, because the same
//! threshold will not cross again.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::threshold::AlertThreshold;
use crate::error::DispatchError;
use crate::plan::StudyPlan;

/// Attention cues requested alongside the visual alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCue {
    pub sound: bool,
    pub vibrate: bool,
}

impl Default for AlertCue {
    fn default() -> Self {
        Self {
            sound: true,
            vibrate: true,
        }
    }
}

/// A user-facing alert for one plan and one threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub plan_id: String,
    pub subject: String,
    pub threshold_id: String,
    pub title: String,
    pub body: String,
    pub urgent: bool,
    pub cue: AlertCue,
    pub exam_deadline: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

/// Renders alert text in the observer's local time.
///
/// The local zone is resolved per alert, so a long-running host follows
/// daylight-saving changes.
#[derive(Debug, Clone, Copy)]
pub struct AlertFormatter {
    zone: DisplayZone,
}

#[derive(Debug, Clone, Copy)]
enum DisplayZone {
    Local,
    Fixed(FixedOffset),
}

impl AlertFormatter {
    /// Use the machine's local time zone.
    pub fn local() -> Self {
        Self {
            zone: DisplayZone::Local,
        }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            zone: DisplayZone::Fixed(offset),
        }
    }

    pub fn title(&self, threshold: &AlertThreshold) -> String {
        format!("Exam in {}!", threshold.label)
    }

    pub fn body(&self, threshold: &AlertThreshold, plan: &StudyPlan) -> String {
        if threshold.urgent {
            format!(
                "Your {} exam is at {}. Get ready!",
                plan.subject,
                self.render(plan.exam_deadline, "%-I:%M %p")
            )
        } else {
            format!(
                "Your {} exam is at {}. Time to prepare!",
                plan.subject,
                self.render(plan.exam_deadline, "%b %-d, %-I:%M %p")
            )
        }
    }

    fn render(&self, at: DateTime<Utc>, fmt: &str) -> String {
        match self.zone {
            DisplayZone::Local => at.with_timezone(&Local).format(fmt).to_string(),
            DisplayZone::Fixed(offset) => at.with_timezone(&offset).format(fmt).to_string(),
        }
    }
}

impl Default for AlertFormatter {
    fn default() -> Self {
        Self::local()
    }
}

/// Surface that presents alerts to the observer.
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// Returns an error if the alert could not be presented.
    fn present(&self, alert: &Alert) -> Result<(), DispatchError>;
}

/// Writes alerts to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn present(&self, alert: &Alert) -> Result<(), DispatchError> {
        tracing::info!(
            plan_id = %alert.plan_id,
            threshold = %alert.threshold_id,
            urgent = alert.urgent,
            title = %alert.title,
            "{}",
            alert.body,
        );
        Ok(())
    }
}

/// Forwards alerts to an in-process receiver owned by the host.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    fn present(&self, alert: &Alert) -> Result<(), DispatchError> {
        self.tx
            .send(alert.clone())
            .map_err(|_| DispatchError::ChannelClosed)
    }
}

/// Builds alerts and fans them out to sinks.
pub struct Dispatcher {
    formatter: AlertFormatter,
    cue: AlertCue,
    enabled: bool,
    sinks: Vec<Box<dyn AlertSink>>,
}

impl Dispatcher {
    pub fn new(formatter: AlertFormatter) -> Self {
        Self {
            formatter,
            cue: AlertCue::default(),
            enabled: true,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_cue(mut self, cue: AlertCue) -> Self {
        self.cue = cue;
        self
    }

    /// Disabled dispatchers still build alerts but present nothing.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(&self, threshold: &AlertThreshold, plan: &StudyPlan, now: DateTime<Utc>) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            plan_id: plan.id.clone(),
            subject: plan.subject.clone(),
            threshold_id: threshold.id.clone(),
            title: self.formatter.title(threshold),
            body: self.formatter.body(threshold, plan),
            urgent: threshold.urgent,
            cue: self.cue,
            exam_deadline: plan.exam_deadline,
            issued_at: now,
        }
    }

    /// Present one alert on every sink. Never fails; returns the number of
    /// sinks that accepted the alert.
    pub fn dispatch(&self, threshold: &AlertThreshold, plan: &StudyPlan, now: DateTime<Utc>) -> usize {
        let alert = self.build(threshold, plan, now);
        self.present_all(&alert)
    }

    /// Present a sample alert so the observer can check their setup.
    pub fn send_test(&self, now: DateTime<Utc>) -> usize {
        let alert = Alert {
            id: Uuid::new_v4(),
            plan_id: "test".into(),
            subject: "test".into(),
            threshold_id: "test".into(),
            title: "Test Notification".into(),
            body: "This is a test notification.".into(),
            urgent: false,
            cue: self.cue,
            exam_deadline: now,
            issued_at: now,
        };
        self.present_all(&alert)
    }

    fn present_all(&self, alert: &Alert) -> usize {
        if !self.enabled {
            tracing::debug!(
                plan_id = %alert.plan_id,
                threshold = %alert.threshold_id,
                "Notifications disabled, alert not presented",
            );
            return 0;
        }

        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.present(alert) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        sink = sink.name(),
                        plan_id = %alert.plan_id,
                        threshold = %alert.threshold_id,
                        error = %e,
                        "Failed to present alert",
                    );
                }
            }
        }
        delivered
    }
}

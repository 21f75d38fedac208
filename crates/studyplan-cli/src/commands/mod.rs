pub mod check;
pub mod config;
pub mod notify;
pub mod records;
pub mod thresholds;
pub mod watch;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use studyplan_core::{
    Alert, AlertFormatter, AlertSink, Config, DispatchError, Dispatcher, FilePlanSource,
    HttpPlanSource, PlanSource,
};

/// Options shared by commands that read plans.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Observer (user) id whose plans are watched
    #[arg(long)]
    pub observer: String,
    /// Read plans from a JSON file instead of the web API
    #[arg(long)]
    pub plans_file: Option<PathBuf>,
    /// Override the web API base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Pick the plan source: command line first, then config.
pub fn build_source(
    config: &Config,
    args: &SourceArgs,
) -> Result<Arc<dyn PlanSource>, Box<dyn std::error::Error>> {
    if let Some(path) = args.plans_file.as_ref().or(config.source.plans_file.as_ref()) {
        return Ok(Arc::new(FilePlanSource::new(path.clone())));
    }
    let base_url = args.base_url.as_deref().unwrap_or(&config.source.base_url);
    Ok(Arc::new(HttpPlanSource::new(base_url)?))
}

/// Dispatcher honoring the notification preferences. Sinks are added by
/// the caller.
pub fn build_dispatcher(config: &Config) -> Dispatcher {
    Dispatcher::new(AlertFormatter::local())
        .with_cue(config.cue())
        .enabled(config.notifications.enabled)
}

/// Prints alerts to the terminal, ringing the bell when sound is on.
pub struct TerminalSink;

impl AlertSink for TerminalSink {
    fn name(&self) -> &str {
        "terminal"
    }

    fn present(&self, alert: &Alert) -> Result<(), DispatchError> {
        let mut out = std::io::stdout().lock();
        let bell = if alert.cue.sound { "\x07" } else { "" };
        let marker = if alert.urgent { "!!" } else { "--" };
        writeln!(out, "{bell}{marker} {}\n   {}", alert.title, alert.body)
            .and_then(|_| out.flush())
            .map_err(|e| DispatchError::Sink {
                sink: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

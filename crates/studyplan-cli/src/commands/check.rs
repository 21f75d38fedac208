use chrono::{DateTime, Utc};
use clap::Args;
use studyplan_core::{
    Config, DeadlineScheduler, LogSink, ManualClock, SchedulerConfig, SqliteRecordStore,
};

use super::{build_dispatcher, build_source, SourceArgs};

#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Evaluate as if the current time were this RFC 3339 instant
    #[arg(long)]
    pub at: Option<String>,
    /// Use a throwaway in-memory record store
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;

    let observer = args.source.observer.as_str();
    let source = build_source(&config, &args.source)?;
    let store = if args.dry_run {
        SqliteRecordStore::open_memory(observer)?
    } else {
        SqliteRecordStore::open(observer)?
    };
    let dispatcher = build_dispatcher(&config).with_sink(LogSink);

    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::from_config(&config, observer),
        source,
        store,
        dispatcher,
    )
    .with_thresholds(config.thresholds.clone());

    if let Some(raw) = &args.at {
        let at: DateTime<Utc> = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid --at value {raw:?}: {e}"))?
            .with_timezone(&Utc);
        scheduler = scheduler.with_clock(ManualClock::new(at));
    }

    let report = scheduler.tick_now().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

use std::time::Duration;

use clap::Args;
use studyplan_core::{Config, DeadlineScheduler, SchedulerConfig, SqliteRecordStore};

use super::{build_dispatcher, build_source, SourceArgs, TerminalSink};

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Seconds between ticks (overrides scheduler.tick_interval_secs)
    #[arg(long)]
    pub interval: Option<u64>,
}

pub async fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;

    let mut scheduler_config = SchedulerConfig::from_config(&config, &args.source.observer);
    if let Some(secs) = args.interval {
        scheduler_config = scheduler_config.with_tick_interval(Duration::from_secs(secs));
    }

    let source = build_source(&config, &args.source)?;
    let store = SqliteRecordStore::open(&args.source.observer)?;
    let dispatcher = build_dispatcher(&config).with_sink(TerminalSink);

    let scheduler = DeadlineScheduler::new(scheduler_config, source, store, dispatcher)
        .with_thresholds(config.thresholds.clone());

    tracing::info!(observer_id = %args.source.observer, "Watching study plans, Ctrl+C to stop");
    let handle = scheduler.start();
    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted, waiting for the current tick");
    handle.stop().await?;
    tracing::info!("Stopped");
    Ok(())
}

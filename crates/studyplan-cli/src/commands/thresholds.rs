use clap::Subcommand;
use studyplan_core::Config;

#[derive(Subcommand)]
pub enum ThresholdsAction {
    /// List configured alert thresholds, farthest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: ThresholdsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ThresholdsAction::List { json } => {
            let config = Config::load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config.thresholds)?);
                return Ok(());
            }
            for threshold in config.thresholds.iter() {
                let urgent = if threshold.urgent { " (urgent)" } else { "" };
                println!(
                    "{:<6} {:>5} min  {}{urgent}",
                    threshold.id, threshold.lead_minutes, threshold.label
                );
            }
        }
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "studyplan", version, about = "Study plan deadline alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deadline scheduler until interrupted
    Watch(commands::watch::WatchArgs),
    /// Run a single evaluation tick and print the report
    Check(commands::check::CheckArgs),
    /// Inspect or clear notification records
    Records {
        #[command(subcommand)]
        action: commands::records::RecordsAction,
    },
    /// Alert thresholds
    Thresholds {
        #[command(subcommand)]
        action: commands::thresholds::ThresholdsAction,
    },
    /// Notification checks
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("studyplan=info,studyplan_core=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Watch(args) => commands::watch::run(args).await,
        Commands::Check(args) => commands::check::run(args).await,
        Commands::Records { action } => commands::records::run(action),
        Commands::Thresholds { action } => commands::thresholds::run(action),
        Commands::Notify { action } => commands::notify::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

use chrono::Utc;
use clap::Subcommand;
use studyplan_core::Config;

use super::{build_dispatcher, TerminalSink};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Present a sample alert with the configured cues
    Test,
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        NotifyAction::Test => {
            let config = Config::load()?;
            let dispatcher = build_dispatcher(&config).with_sink(TerminalSink);
            if dispatcher.send_test(Utc::now()) == 0 {
                return Err("notification not presented (notifications.enabled is false?)".into());
            }
        }
    }
    Ok(())
}

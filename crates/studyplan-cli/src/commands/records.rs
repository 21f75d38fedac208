use clap::Subcommand;
use studyplan_core::SqliteRecordStore;

#[derive(Subcommand)]
pub enum RecordsAction {
    /// List notification records
    List {
        /// Observer (user) id
        #[arg(long)]
        observer: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all notification records of an observer
    Clear {
        /// Observer (user) id
        #[arg(long)]
        observer: String,
    },
}

pub fn run(action: RecordsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RecordsAction::List { observer, json } => {
            let store = SqliteRecordStore::open(&observer)?;
            let records = store.list_records()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            if records.is_empty() {
                println!("No notification records.");
                return Ok(());
            }
            for record in &records {
                let fired: Vec<&str> = record.fired().iter().map(String::as_str).collect();
                println!(
                    "{}  {}  {}  fired: [{}]",
                    record.plan_id,
                    record.subject,
                    record.exam_deadline.to_rfc3339(),
                    fired.join(", "),
                );
            }
        }
        RecordsAction::Clear { observer } => {
            let mut store = SqliteRecordStore::open(&observer)?;
            let removed = store.clear()?;
            println!("Removed {removed} record(s)");
        }
    }
    Ok(())
}

use clap::Subcommand;
use diakit_core::{Database, HistoryEventKind, HistoryLog};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List history events as JSON, newest first
    List {
        /// Only events from the last N days
        #[arg(long)]
        days: Option<i64>,
        /// Only events of this kind (e.g. "supply_added")
        #[arg(long)]
        kind: Option<String>,
        /// Only events referencing this supply
        #[arg(long)]
        supply: Option<String>,
        /// Cap the number of events returned
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete every history event
    Clear,
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let log = HistoryLog::new(&db);

    match action {
        HistoryAction::List {
            days,
            kind,
            supply,
            limit,
        } => {
            let mut events = if let Some(kind) = kind {
                log.by_kind(kind.parse::<HistoryEventKind>()?)?
            } else if let Some(supply_id) = supply.as_deref() {
                log.by_supply(supply_id)?
            } else if let Some(days) = days {
                log.since_days(days)?
            } else {
                log.recent(limit)?
            };
            if let Some(limit) = limit {
                events.truncate(limit);
            }
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        HistoryAction::Clear => {
            log.clear()?;
            println!("{{\"cleared\": true}}");
        }
    }

    Ok(())
}

use clap::Subcommand;
use diakit_core::{Database, HistoryLog, ReminderEngine, SupplyStore};

use crate::delivery::ConsoleDelivery;

#[derive(Subcommand)]
pub enum DataAction {
    /// Wipe all records, alert tracking, and pending notifications
    Clear,
}

pub fn run(action: DataAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        DataAction::Clear => {
            let mut store = SupplyStore::load(&db)?;
            store.clear_all()?;

            let delivery = ConsoleDelivery;
            let mut engine = ReminderEngine::new(&db, &delivery);
            engine.reset_tracking()?;

            HistoryLog::new(&db).log_data_cleared()?;
            println!("{{\"cleared\": true}}");
        }
    }

    Ok(())
}

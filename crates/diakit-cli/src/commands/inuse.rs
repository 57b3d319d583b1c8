use chrono::Utc;
use clap::Subcommand;
use diakit_core::{Database, HistoryLog, InUseStatus, ItemDetails, SupplyStore};

use super::{reconcile, Change};

#[derive(Subcommand)]
pub enum InUseAction {
    /// List in-use items with their countdown state
    List,
    /// Record insulin usage against an item
    Dose {
        id: String,
        /// Volume used, in the item's unit
        #[arg(long)]
        volume: f64,
    },
    /// Stop a device before its scheduled expiry
    EndEarly { id: String },
    /// Remove an item (discarded or replaced)
    Remove { id: String },
}

pub fn run(action: InUseAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let mut store = SupplyStore::load(&db)?;
    let log = HistoryLog::new(&db);

    match action {
        InUseAction::List => {
            let now = Utc::now();
            let rows: Vec<serde_json::Value> = store
                .in_use_items()
                .iter()
                .map(|item| {
                    serde_json::json!({
                        "item": item,
                        "status": InUseStatus::compute(item, now),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        InUseAction::Dose { id, volume } => {
            let item = store.record_insulin_use(&id, volume)?;
            if let ItemDetails::Insulin {
                remaining_volume,
                unit,
                ..
            } = &item.details
            {
                log.log_insulin_use(
                    &item.id,
                    &item.supply_name,
                    volume,
                    *remaining_volume,
                    unit.as_str(),
                )?;
            }
            println!("{}", serde_json::to_string_pretty(&item)?);
            reconcile(&db, &store, Change::None);
        }
        InUseAction::EndEarly { id } => {
            let item = store.end_device_early(&id, Utc::now())?;
            log.log_device_ended_early(&item.id, &item.supply_name)?;
            println!("{}", serde_json::to_string_pretty(&item)?);
            reconcile(&db, &store, Change::ItemStopped(&id));
        }
        InUseAction::Remove { id } => {
            let removed = store.remove_in_use(&id)?;
            log.log_item_stopped(&removed.id, &removed.supply_name)?;
            println!("{}", serde_json::to_string_pretty(&removed)?);
            reconcile(&db, &store, Change::ItemStopped(&id));
        }
    }

    Ok(())
}

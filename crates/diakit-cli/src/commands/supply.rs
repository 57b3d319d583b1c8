use clap::Subcommand;
use diakit_core::{
    Database, HistoryLog, ItemDetails, SupplyCategory, SupplyDraft, SupplyPatch, SupplyStore,
    VolumeUnit,
};

use super::{parse_date, reconcile, Change};

#[derive(Subcommand)]
pub enum SupplyAction {
    /// Add a supply to the inventory
    Add {
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value_t = 0)]
        quantity: u32,
        /// Expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Per-supply low stock warning threshold
        #[arg(long)]
        warning_threshold: Option<u32>,
    },
    /// List supplies as JSON
    List {
        #[arg(long)]
        category: Option<String>,
        /// Only supplies at or below their warning threshold
        #[arg(long)]
        low_stock: bool,
    },
    /// Update fields on a supply
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        quantity: Option<u32>,
        /// Expiration date (YYYY-MM-DD)
        #[arg(long)]
        expires: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        warning_threshold: Option<u32>,
    },
    /// Delete a supply
    Delete { id: String },
    /// Start using one unit of a supply
    Use {
        id: String,
        #[command(subcommand)]
        details: UseDetails,
    },
}

#[derive(Subcommand)]
pub enum UseDetails {
    /// Track an insulin vial or pen by remaining volume
    Insulin {
        /// Total volume of the vial/pen
        #[arg(long)]
        volume: f64,
        /// "ml" or "units"
        #[arg(long, default_value = "units")]
        unit: String,
    },
    /// Track a wearable device by wear duration
    Device {
        /// Wear duration in hours
        #[arg(long)]
        hours: u32,
        /// Grace period after expiry in hours
        #[arg(long)]
        grace: Option<u32>,
    },
}

pub fn run(action: SupplyAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let mut store = SupplyStore::load(&db)?;
    let log = HistoryLog::new(&db);

    match action {
        SupplyAction::Add {
            name,
            category,
            quantity,
            expires,
            notes,
            warning_threshold,
        } => {
            let draft = SupplyDraft {
                name,
                category: category.parse::<SupplyCategory>()?,
                quantity,
                expiration_date: expires.as_deref().map(parse_date).transpose()?,
                notes,
                warning_threshold,
            };
            let supply = store.add_supply(draft)?.clone();
            log.log_supply_added(
                &supply.id,
                &supply.name,
                supply.category.as_str(),
                supply.quantity,
            )?;
            println!("{}", serde_json::to_string_pretty(&supply)?);
            reconcile(&db, &store, Change::None);
        }
        SupplyAction::List {
            category,
            low_stock,
        } => {
            let category = category
                .as_deref()
                .map(str::parse::<SupplyCategory>)
                .transpose()?;
            let supplies: Vec<_> = store
                .supplies()
                .iter()
                .filter(|s| category.is_none_or(|c| s.category == c))
                .filter(|s| !low_stock || s.quantity <= s.warning_threshold_or_default())
                .collect();
            println!("{}", serde_json::to_string_pretty(&supplies)?);
        }
        SupplyAction::Update {
            id,
            name,
            category,
            quantity,
            expires,
            notes,
            warning_threshold,
        } => {
            let patch = SupplyPatch {
                name,
                category: category.as_deref().map(str::parse).transpose()?,
                quantity,
                expiration_date: expires.as_deref().map(parse_date).transpose()?.map(Some),
                notes: notes.map(Some),
                warning_threshold: warning_threshold.map(Some),
            };
            let update = store.update_supply(&id, patch)?;
            if update.after.quantity != update.before.quantity {
                log.log_quantity_changed(
                    &id,
                    &update.after.name,
                    update.before.quantity,
                    update.after.quantity,
                )?;
            } else {
                log.log_supply_updated(&id, &update.after.name, "details edited")?;
            }
            println!("{}", serde_json::to_string_pretty(&update.after)?);

            let change = if update.is_restock() {
                Change::Restocked(&id)
            } else {
                Change::None
            };
            reconcile(&db, &store, change);
        }
        SupplyAction::Delete { id } => {
            let removed = store.delete_supply(&id)?;
            log.log_supply_deleted(&id, &removed.name)?;
            println!("{}", serde_json::to_string_pretty(&removed)?);
            reconcile(&db, &store, Change::SupplyDeleted(&id));
        }
        SupplyAction::Use { id, details } => {
            let (details, grace) = match details {
                UseDetails::Insulin { volume, unit } => (
                    ItemDetails::Insulin {
                        total_volume: volume,
                        remaining_volume: volume,
                        unit: unit.parse::<VolumeUnit>()?,
                    },
                    None,
                ),
                UseDetails::Device { hours, grace } => (
                    ItemDetails::Device {
                        duration_hours: hours,
                        ended_early: false,
                    },
                    grace,
                ),
            };
            let item = store.start_using(&id, details, grace, chrono::Utc::now())?;
            log.log_item_started(
                &item.id,
                &id,
                &item.supply_name,
                item.category.as_str(),
            )?;
            println!("{}", serde_json::to_string_pretty(&item)?);
            reconcile(&db, &store, Change::None);
        }
    }

    Ok(())
}

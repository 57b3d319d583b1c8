use clap::Subcommand;
use diakit_core::{Database, HistoryLog, ReminderEngine, SettingsPatch, SupplyStore};

use crate::delivery::ConsoleDelivery;

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Print the current reminder settings
    Show,
    /// Change reminder settings
    Set {
        #[arg(long)]
        low_stock_enabled: Option<bool>,
        #[arg(long)]
        expiration_enabled: Option<bool>,
        #[arg(long)]
        device_timer_enabled: Option<bool>,
        /// Fallback low-stock quantity threshold
        #[arg(long)]
        low_stock_threshold: Option<u32>,
        /// Warn this many days before a supply expires
        #[arg(long)]
        expiration_days: Option<i64>,
        /// Remind this many hours before a device expires
        #[arg(long)]
        device_reminder_hours: Option<i64>,
    },
    /// Recompute and issue all due reminders
    Reconcile,
    /// Forget every delivered alert and cancel pending deliveries
    ResetTracking,
}

pub fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let delivery = ConsoleDelivery;
    let mut engine = ReminderEngine::new(&db, &delivery);

    match action {
        NotifyAction::Show => {
            println!("{}", serde_json::to_string_pretty(engine.settings())?);
        }
        NotifyAction::Set {
            low_stock_enabled,
            expiration_enabled,
            device_timer_enabled,
            low_stock_threshold,
            expiration_days,
            device_reminder_hours,
        } => {
            let settings = engine.update_settings(&SettingsPatch {
                low_stock_enabled,
                expiration_enabled,
                device_timer_enabled,
                low_stock_threshold,
                expiration_days,
                device_reminder_hours,
            })?;
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        NotifyAction::Reconcile => {
            let store = SupplyStore::load(&db)?;
            let due = engine.reconcile(store.supplies(), store.in_use_items());
            let log = HistoryLog::new(&db);
            for alert in due.iter().filter(|a| a.is_immediate()) {
                log.log_notification_sent(alert.key.category(), &alert.body)?;
            }
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
        NotifyAction::ResetTracking => {
            engine.reset_tracking()?;
            println!("{{\"reset\": true}}");
        }
    }

    Ok(())
}

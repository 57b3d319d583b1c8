pub mod data;
pub mod history;
pub mod inuse;
pub mod notify;
pub mod supply;
pub mod timer;

use chrono::{DateTime, Utc};
use diakit_core::{Database, HistoryLog, ReminderEngine, SupplyStore};

use crate::delivery::ConsoleDelivery;

/// What a command just changed, for alert bookkeeping ahead of the
/// reconcile pass.
pub(crate) enum Change<'a> {
    None,
    /// Quantity was raised; delivered alerts for the supply are cleared
    /// so a future drop re-alerts.
    Restocked(&'a str),
    /// Supply removed; pending alerts are cancelled and tracking cleared.
    SupplyDeleted(&'a str),
    /// In-use item ended or removed; its armed device alerts die with it.
    ItemStopped(&'a str),
}

/// Recompute reminders after a record change and mirror delivered
/// immediate alerts into the history log.
pub(crate) fn reconcile(db: &Database, store: &SupplyStore<'_>, change: Change<'_>) {
    let delivery = ConsoleDelivery;
    let mut engine = ReminderEngine::new(db, &delivery);
    match change {
        Change::None => {}
        Change::Restocked(id) => engine.clear_for_supply(id),
        Change::SupplyDeleted(id) => {
            engine.cancel_for_supply(id);
            engine.clear_for_supply(id);
        }
        Change::ItemStopped(id) => engine.cancel_for_in_use_item(id),
    }

    let due = engine.reconcile(store.supplies(), store.in_use_items());
    let log = HistoryLog::new(db);
    for alert in due.iter().filter(|a| a.is_immediate()) {
        if let Err(e) = log.log_notification_sent(alert.key.category(), &alert.body) {
            eprintln!("warning: failed to record notification history: {e}");
        }
    }
}

/// Parse a YYYY-MM-DD date into the UTC instant at midnight.
pub(crate) fn parse_date(s: &str) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or("invalid date")?;
    Ok(midnight.and_utc())
}

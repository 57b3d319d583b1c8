//! Reminder subsystem: alert identity, dedup tracking, settings, the
//! delivery seam, and the policy engine that ties them together.

mod delivery;
mod engine;
mod key;
mod settings;
mod tracker;

pub use delivery::{NoopDelivery, NotificationDelivery, Trigger};
pub use engine::{DueAlert, ReminderEngine};
pub use key::{AlertKey, ParseAlertKeyError};
pub use settings::{ReminderSettings, SettingsPatch, SETTINGS_KEY};
pub use tracker::{SentAlerts, STALE_AFTER_HOURS, TRACKER_KEY};

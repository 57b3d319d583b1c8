//! User-tunable reminder settings.
//!
//! Persisted as a single JSON blob in the kv table. Loading never fails:
//! a missing or unreadable blob yields the defaults.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::Database;

/// kv key holding the serialized settings.
pub const SETTINGS_KEY: &str = "diakit-notification-settings";

/// Enable flags and thresholds for the three reminder categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    #[serde(default = "default_true")]
    pub low_stock_enabled: bool,
    #[serde(default = "default_true")]
    pub expiration_enabled: bool,
    #[serde(default = "default_true")]
    pub device_timer_enabled: bool,
    /// Fallback quantity threshold for supplies without their own.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: u32,
    /// Warn when a supply expires within this many days.
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
    /// Remind this many hours before a device expires.
    #[serde(default = "default_device_reminder_hours")]
    pub device_reminder_hours: i64,
}

fn default_true() -> bool {
    true
}
fn default_low_stock_threshold() -> u32 {
    3
}
fn default_expiration_days() -> i64 {
    7
}
fn default_device_reminder_hours() -> i64 {
    24
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            low_stock_enabled: true,
            expiration_enabled: true,
            device_timer_enabled: true,
            low_stock_threshold: default_low_stock_threshold(),
            expiration_days: default_expiration_days(),
            device_reminder_hours: default_device_reminder_hours(),
        }
    }
}

impl ReminderSettings {
    /// Load from storage, falling back to defaults on any failure.
    pub fn load(db: &Database) -> Self {
        match db.kv_get(SETTINGS_KEY) {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unparseable settings blob");
                    Self::default()
                }
            },
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read settings, using defaults");
                Self::default()
            }
        }
    }

    /// Persist to storage.
    ///
    /// # Errors
    /// Returns an error if serialization or the kv write fails.
    pub fn save(&self, db: &Database) -> Result<()> {
        let json = serde_json::to_string(self)?;
        db.kv_set(SETTINGS_KEY, &json)?;
        Ok(())
    }

    /// Merge a partial update over the current values.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.low_stock_enabled {
            self.low_stock_enabled = v;
        }
        if let Some(v) = patch.expiration_enabled {
            self.expiration_enabled = v;
        }
        if let Some(v) = patch.device_timer_enabled {
            self.device_timer_enabled = v;
        }
        if let Some(v) = patch.low_stock_threshold {
            self.low_stock_threshold = v;
        }
        if let Some(v) = patch.expiration_days {
            self.expiration_days = v;
        }
        if let Some(v) = patch.device_reminder_hours {
            self.device_reminder_hours = v;
        }
    }
}

/// Partial settings update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub low_stock_enabled: Option<bool>,
    pub expiration_enabled: Option<bool>,
    pub device_timer_enabled: Option<bool>,
    pub low_stock_threshold: Option<u32>,
    pub expiration_days: Option<i64>,
    pub device_reminder_hours: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_absent_or_malformed() {
        let db = Database::open_memory().unwrap();
        assert_eq!(ReminderSettings::load(&db), ReminderSettings::default());

        db.kv_set(SETTINGS_KEY, "{{{").unwrap();
        assert_eq!(ReminderSettings::load(&db), ReminderSettings::default());
    }

    #[test]
    fn save_load_roundtrip() {
        let db = Database::open_memory().unwrap();
        let mut settings = ReminderSettings::default();
        settings.low_stock_enabled = false;
        settings.expiration_days = 14;
        settings.save(&db).unwrap();

        let loaded = ReminderSettings::load(&db);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_blob_fills_defaults() {
        let db = Database::open_memory().unwrap();
        db.kv_set(SETTINGS_KEY, r#"{"low_stock_threshold": 9}"#).unwrap();
        let loaded = ReminderSettings::load(&db);
        assert_eq!(loaded.low_stock_threshold, 9);
        assert!(loaded.low_stock_enabled);
        assert_eq!(loaded.device_reminder_hours, 24);
    }

    #[test]
    fn apply_merges_patch() {
        let mut settings = ReminderSettings::default();
        settings.apply(&SettingsPatch {
            device_timer_enabled: Some(false),
            expiration_days: Some(3),
            ..SettingsPatch::default()
        });
        assert!(!settings.device_timer_enabled);
        assert_eq!(settings.expiration_days, 3);
        assert_eq!(settings.low_stock_threshold, 3);
    }
}

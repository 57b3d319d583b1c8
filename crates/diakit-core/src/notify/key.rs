//! Structured alert identifiers.
//!
//! Every reminder carries a stable string identifier used for OS-level
//! scheduling, cancellation, and dedup tracking. Internally the key is a
//! tagged value so clearing "everything for supply X" compares whole ids
//! instead of substrings -- `low-stock-12-3` must never match a clear for
//! supply `1`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier for a single reminder.
///
/// The wire form (`Display`/`FromStr`) is what reaches the delivery layer
/// and the persisted tracker blob. Low-stock keys embed the quantity at
/// alert time, so each further drop in stock is a distinct alert.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKey {
    LowStock { supply_id: String, quantity: u32 },
    Expiration { supply_id: String },
    DeviceReminder { item_id: String },
    DeviceExpiry { item_id: String },
    GracePeriodEnd { item_id: String },
}

/// A stored identifier that did not parse back into an [`AlertKey`].
#[derive(Debug, Error)]
#[error("unrecognized alert key '{0}'")]
pub struct ParseAlertKeyError(pub String);

impl AlertKey {
    /// The supply or in-use item id the key refers to.
    pub fn subject_id(&self) -> &str {
        match self {
            AlertKey::LowStock { supply_id, .. } | AlertKey::Expiration { supply_id } => supply_id,
            AlertKey::DeviceReminder { item_id }
            | AlertKey::DeviceExpiry { item_id }
            | AlertKey::GracePeriodEnd { item_id } => item_id,
        }
    }

    pub fn is_low_stock(&self) -> bool {
        matches!(self, AlertKey::LowStock { .. })
    }

    /// Short category name, used for history entries.
    pub fn category(&self) -> &'static str {
        match self {
            AlertKey::LowStock { .. } => "low-stock",
            AlertKey::Expiration { .. } => "expiration",
            AlertKey::DeviceReminder { .. } => "device-reminder",
            AlertKey::DeviceExpiry { .. } => "device-expiry",
            AlertKey::GracePeriodEnd { .. } => "grace-period-end",
        }
    }
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKey::LowStock {
                supply_id,
                quantity,
            } => write!(f, "low-stock-{supply_id}-{quantity}"),
            AlertKey::Expiration { supply_id } => write!(f, "expiration-{supply_id}"),
            AlertKey::DeviceReminder { item_id } => write!(f, "device-reminder-{item_id}"),
            AlertKey::DeviceExpiry { item_id } => write!(f, "device-expiry-{item_id}"),
            AlertKey::GracePeriodEnd { item_id } => write!(f, "grace-period-end-{item_id}"),
        }
    }
}

impl FromStr for AlertKey {
    type Err = ParseAlertKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseAlertKeyError(s.to_string());

        if let Some(rest) = s.strip_prefix("low-stock-") {
            // Ids may themselves contain '-', so the quantity is split off
            // the right.
            let (supply_id, quantity) = rest.rsplit_once('-').ok_or_else(malformed)?;
            if supply_id.is_empty() {
                return Err(malformed());
            }
            let quantity = quantity.parse().map_err(|_| malformed())?;
            return Ok(AlertKey::LowStock {
                supply_id: supply_id.to_string(),
                quantity,
            });
        }
        if let Some(id) = non_empty(s.strip_prefix("expiration-")) {
            return Ok(AlertKey::Expiration { supply_id: id });
        }
        if let Some(id) = non_empty(s.strip_prefix("device-reminder-")) {
            return Ok(AlertKey::DeviceReminder { item_id: id });
        }
        if let Some(id) = non_empty(s.strip_prefix("device-expiry-")) {
            return Ok(AlertKey::DeviceExpiry { item_id: id });
        }
        if let Some(id) = non_empty(s.strip_prefix("grace-period-end-")) {
            return Ok(AlertKey::GracePeriodEnd { item_id: id });
        }
        Err(malformed())
    }
}

fn non_empty(rest: Option<&str>) -> Option<String> {
    rest.filter(|s| !s.is_empty()).map(str::to_string)
}

impl Serialize for AlertKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AlertKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//! Record types for stocked supplies, replacement timers, and items in use.

mod status;
mod store;

pub use status::{InUseStatus, TimerStatus};
pub use store::{
    SupplyDraft, SupplyPatch, SupplyStore, SupplyUpdate, TimerDraft, TimerPatch,
    IN_USE_KEY, SUPPLIES_KEY, TIMERS_KEY,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Warning threshold applied when a supply has none of its own.
pub const DEFAULT_WARNING_THRESHOLD: u32 = 5;

/// Category of a stocked supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupplyCategory {
    Insulin,
    Cgm,
    TestStrips,
    Lancets,
    Needles,
    InfusionSets,
    Pump,
    Other,
}

impl SupplyCategory {
    pub const ALL: [SupplyCategory; 8] = [
        SupplyCategory::Insulin,
        SupplyCategory::Cgm,
        SupplyCategory::TestStrips,
        SupplyCategory::Lancets,
        SupplyCategory::Needles,
        SupplyCategory::InfusionSets,
        SupplyCategory::Pump,
        SupplyCategory::Other,
    ];

    /// Human-readable display name.
    pub fn label(&self) -> &'static str {
        match self {
            SupplyCategory::Insulin => "Insulin",
            SupplyCategory::Cgm => "CGM/Sensors",
            SupplyCategory::TestStrips => "Test Strips",
            SupplyCategory::Lancets => "Lancets",
            SupplyCategory::Needles => "Needles",
            SupplyCategory::InfusionSets => "Infusion Sets",
            SupplyCategory::Pump => "Insulin Pump",
            SupplyCategory::Other => "Other Supplies",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupplyCategory::Insulin => "insulin",
            SupplyCategory::Cgm => "cgm",
            SupplyCategory::TestStrips => "test-strips",
            SupplyCategory::Lancets => "lancets",
            SupplyCategory::Needles => "needles",
            SupplyCategory::InfusionSets => "infusion-sets",
            SupplyCategory::Pump => "pump",
            SupplyCategory::Other => "other",
        }
    }
}

impl std::str::FromStr for SupplyCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SupplyCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "category".to_string(),
                message: format!("unknown category '{s}'"),
            })
    }
}

/// A stocked consumable item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supply {
    pub id: String,
    pub name: String,
    pub category: SupplyCategory,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<u32>,
}

impl Supply {
    /// The supply's own threshold, or [`DEFAULT_WARNING_THRESHOLD`].
    pub fn warning_threshold_or_default(&self) -> u32 {
        self.warning_threshold.unwrap_or(DEFAULT_WARNING_THRESHOLD)
    }
}

/// Kind of replacement timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerKind {
    Cgm,
    InfusionSet,
    Custom,
}

impl TimerKind {
    /// Typical wear/change interval for this kind of timer.
    pub fn default_duration_days(&self) -> u32 {
        match self {
            TimerKind::Cgm => 10,
            TimerKind::InfusionSet => 3,
            TimerKind::Custom => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Cgm => "cgm",
            TimerKind::InfusionSet => "infusion-set",
            TimerKind::Custom => "custom",
        }
    }
}

impl std::str::FromStr for TimerKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cgm" => Ok(TimerKind::Cgm),
            "infusion-set" => Ok(TimerKind::InfusionSet),
            "custom" => Ok(TimerKind::Custom),
            _ => Err(ValidationError::InvalidValue {
                field: "kind".to_string(),
                message: format!("unknown timer kind '{s}'"),
            }),
        }
    }
}

/// A standalone replacement timer (e.g. "change sensor every 10 days").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTimer {
    pub id: String,
    pub name: String,
    pub kind: TimerKind,
    pub started_at: DateTime<Utc>,
    pub duration_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Unit for insulin volume tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    Ml,
    Units,
}

impl VolumeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeUnit::Ml => "ml",
            VolumeUnit::Units => "units",
        }
    }
}

impl std::str::FromStr for VolumeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ml" => Ok(VolumeUnit::Ml),
            "units" => Ok(VolumeUnit::Units),
            _ => Err(ValidationError::InvalidValue {
                field: "unit".to_string(),
                message: format!("unknown volume unit '{s}'"),
            }),
        }
    }
}

/// Consumption details for an in-use item.
///
/// Insulin is tracked by remaining volume; wearable devices by a wear
/// duration with an optional early termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemDetails {
    Insulin {
        total_volume: f64,
        remaining_volume: f64,
        unit: VolumeUnit,
    },
    Device {
        duration_hours: u32,
        #[serde(default)]
        ended_early: bool,
    },
}

/// An instance of a supply currently being consumed or worn, tracked
/// separately from stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InUseItem {
    pub id: String,
    /// Reference to the originating [`Supply`]. Not enforced as a foreign
    /// key; the supply may have been deleted since.
    pub supply_id: String,
    pub supply_name: String,
    pub category: SupplyCategory,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_ends_at: Option<DateTime<Utc>>,
    pub details: ItemDetails,
}

impl InUseItem {
    /// Whether this is a device still counting down toward its expiry.
    pub fn is_active_device(&self) -> bool {
        matches!(self.details, ItemDetails::Device { ended_early, .. } if !ended_early)
            && self.expires_at.is_some()
    }
}

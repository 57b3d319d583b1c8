//! Append-only log of user-visible actions.

mod store;

pub use store::{HistoryLog, MAX_HISTORY_ENTRIES};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What happened. One kind per user-visible action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventKind {
    SupplyAdded,
    SupplyUpdated,
    SupplyDeleted,
    SupplyQuantityChanged,
    ItemStartedUsing,
    ItemStoppedUsing,
    InsulinVolumeUpdated,
    DeviceEndedEarly,
    TimerAdded,
    TimerUpdated,
    TimerDeleted,
    TimerReset,
    NotificationSent,
    NotificationReceived,
    DataCleared,
}

impl HistoryEventKind {
    pub const ALL: [HistoryEventKind; 15] = [
        HistoryEventKind::SupplyAdded,
        HistoryEventKind::SupplyUpdated,
        HistoryEventKind::SupplyDeleted,
        HistoryEventKind::SupplyQuantityChanged,
        HistoryEventKind::ItemStartedUsing,
        HistoryEventKind::ItemStoppedUsing,
        HistoryEventKind::InsulinVolumeUpdated,
        HistoryEventKind::DeviceEndedEarly,
        HistoryEventKind::TimerAdded,
        HistoryEventKind::TimerUpdated,
        HistoryEventKind::TimerDeleted,
        HistoryEventKind::TimerReset,
        HistoryEventKind::NotificationSent,
        HistoryEventKind::NotificationReceived,
        HistoryEventKind::DataCleared,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryEventKind::SupplyAdded => "supply_added",
            HistoryEventKind::SupplyUpdated => "supply_updated",
            HistoryEventKind::SupplyDeleted => "supply_deleted",
            HistoryEventKind::SupplyQuantityChanged => "supply_quantity_changed",
            HistoryEventKind::ItemStartedUsing => "item_started_using",
            HistoryEventKind::ItemStoppedUsing => "item_stopped_using",
            HistoryEventKind::InsulinVolumeUpdated => "insulin_volume_updated",
            HistoryEventKind::DeviceEndedEarly => "device_ended_early",
            HistoryEventKind::TimerAdded => "timer_added",
            HistoryEventKind::TimerUpdated => "timer_updated",
            HistoryEventKind::TimerDeleted => "timer_deleted",
            HistoryEventKind::TimerReset => "timer_reset",
            HistoryEventKind::NotificationSent => "notification_sent",
            HistoryEventKind::NotificationReceived => "notification_received",
            HistoryEventKind::DataCleared => "data_cleared",
        }
    }

    /// Human-readable display name.
    pub fn label(&self) -> &'static str {
        match self {
            HistoryEventKind::SupplyAdded => "Supply Added",
            HistoryEventKind::SupplyUpdated => "Supply Updated",
            HistoryEventKind::SupplyDeleted => "Supply Deleted",
            HistoryEventKind::SupplyQuantityChanged => "Quantity Changed",
            HistoryEventKind::ItemStartedUsing => "Started Using",
            HistoryEventKind::ItemStoppedUsing => "Stopped Using",
            HistoryEventKind::InsulinVolumeUpdated => "Insulin Used",
            HistoryEventKind::DeviceEndedEarly => "Device Ended Early",
            HistoryEventKind::TimerAdded => "Timer Added",
            HistoryEventKind::TimerUpdated => "Timer Updated",
            HistoryEventKind::TimerDeleted => "Timer Deleted",
            HistoryEventKind::TimerReset => "Timer Reset",
            HistoryEventKind::NotificationSent => "Notification Sent",
            HistoryEventKind::NotificationReceived => "Notification Received",
            HistoryEventKind::DataCleared => "Data Cleared",
        }
    }
}

impl std::str::FromStr for HistoryEventKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HistoryEventKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "kind".to_string(),
                message: format!("unknown history event kind '{s}'"),
            })
    }
}

/// Optional context attached to a history event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_change: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
}

/// A single logged action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: String,
    pub at: DateTime<Utc>,
    pub kind: HistoryEventKind,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HistoryMetadata>,
}

//! History persistence over the SQLite `history` table.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use uuid::Uuid;

use super::{HistoryEvent, HistoryEventKind, HistoryMetadata};
use crate::error::Result;
use crate::storage::Database;

/// Oldest entries past this count are trimmed on every insert.
pub const MAX_HISTORY_ENTRIES: usize = 1000;

/// Query and append interface for the action log.
pub struct HistoryLog<'a> {
    db: &'a Database,
}

impl<'a> HistoryLog<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append an event at an explicit instant.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_at(
        &self,
        kind: HistoryEventKind,
        title: &str,
        description: &str,
        metadata: Option<HistoryMetadata>,
        at: DateTime<Utc>,
    ) -> Result<HistoryEvent> {
        let event = HistoryEvent {
            id: Uuid::new_v4().to_string(),
            at,
            kind,
            title: title.to_string(),
            description: description.to_string(),
            metadata,
        };
        let metadata_json = event
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.db.conn().execute(
            "INSERT INTO history (id, kind, title, description, metadata, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.id,
                event.kind.as_str(),
                event.title,
                event.description,
                metadata_json,
                event.at.to_rfc3339(),
            ],
        )?;
        self.trim()?;
        Ok(event)
    }

    /// Append an event stamped with the current time.
    pub fn record(
        &self,
        kind: HistoryEventKind,
        title: &str,
        description: &str,
        metadata: Option<HistoryMetadata>,
    ) -> Result<HistoryEvent> {
        self.record_at(kind, title, description, metadata, Utc::now())
    }

    fn trim(&self) -> Result<()> {
        self.db.conn().execute(
            "DELETE FROM history WHERE id NOT IN (
                 SELECT id FROM history ORDER BY at DESC, id DESC LIMIT ?1
             )",
            params![MAX_HISTORY_ENTRIES],
        )?;
        Ok(())
    }

    /// Newest-first listing, optionally capped.
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<HistoryEvent>> {
        let limit = limit.unwrap_or(MAX_HISTORY_ENTRIES);
        let mut stmt = self.db.conn().prepare(
            "SELECT id, kind, title, description, metadata, at
             FROM history ORDER BY at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_event)?;
        collect_events(rows)
    }

    pub fn by_kind(&self, kind: HistoryEventKind) -> Result<Vec<HistoryEvent>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, kind, title, description, metadata, at
             FROM history WHERE kind = ?1 ORDER BY at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], row_to_event)?;
        collect_events(rows)
    }

    /// Events whose metadata references the given supply.
    pub fn by_supply(&self, supply_id: &str) -> Result<Vec<HistoryEvent>> {
        let events = self.recent(None)?;
        Ok(events
            .into_iter()
            .filter(|e| {
                e.metadata
                    .as_ref()
                    .and_then(|m| m.supply_id.as_deref())
                    .is_some_and(|id| id == supply_id)
            })
            .collect())
    }

    /// Events from the last `days` days, newest first.
    pub fn since_days(&self, days: i64) -> Result<Vec<HistoryEvent>> {
        let cutoff = Utc::now() - Duration::days(days);
        let mut stmt = self.db.conn().prepare(
            "SELECT id, kind, title, description, metadata, at
             FROM history WHERE at >= ?1 ORDER BY at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![cutoff.to_rfc3339()], row_to_event)?;
        collect_events(rows)
    }

    /// Drop every event.
    pub fn clear(&self) -> Result<()> {
        self.db.conn().execute("DELETE FROM history", [])?;
        Ok(())
    }

    // ── Convenience recorders ────────────────────────────────────────

    pub fn log_supply_added(
        &self,
        supply_id: &str,
        name: &str,
        category: &str,
        quantity: u32,
    ) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::SupplyAdded,
            "Supply Added",
            &format!("Added {quantity} {name} to inventory"),
            Some(HistoryMetadata {
                supply_id: Some(supply_id.to_string()),
                supply_name: Some(name.to_string()),
                supply_category: Some(category.to_string()),
                new_value: Some(quantity.into()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_supply_updated(
        &self,
        supply_id: &str,
        name: &str,
        changes: &str,
    ) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::SupplyUpdated,
            "Supply Updated",
            &format!("Updated {name}: {changes}"),
            Some(HistoryMetadata {
                supply_id: Some(supply_id.to_string()),
                supply_name: Some(name.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_supply_deleted(&self, supply_id: &str, name: &str) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::SupplyDeleted,
            "Supply Deleted",
            &format!("Removed {name} from inventory"),
            Some(HistoryMetadata {
                supply_id: Some(supply_id.to_string()),
                supply_name: Some(name.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_quantity_changed(
        &self,
        supply_id: &str,
        name: &str,
        old_quantity: u32,
        new_quantity: u32,
    ) -> Result<HistoryEvent> {
        let change = i64::from(new_quantity) - i64::from(old_quantity);
        let change_text = if change > 0 {
            format!("+{change}")
        } else {
            format!("{change}")
        };
        self.record(
            HistoryEventKind::SupplyQuantityChanged,
            "Quantity Changed",
            &format!("{name}: {change_text} ({old_quantity} -> {new_quantity})"),
            Some(HistoryMetadata {
                supply_id: Some(supply_id.to_string()),
                supply_name: Some(name.to_string()),
                old_value: Some(old_quantity.into()),
                new_value: Some(new_quantity.into()),
                quantity_change: Some(change),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_item_started(
        &self,
        item_id: &str,
        supply_id: &str,
        name: &str,
        category: &str,
    ) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::ItemStartedUsing,
            "Started Using Item",
            &format!("Started using {name}"),
            Some(HistoryMetadata {
                item_id: Some(item_id.to_string()),
                supply_id: Some(supply_id.to_string()),
                supply_name: Some(name.to_string()),
                supply_category: Some(category.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_item_stopped(&self, item_id: &str, name: &str) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::ItemStoppedUsing,
            "Stopped Using Item",
            &format!("Stopped using {name}"),
            Some(HistoryMetadata {
                item_id: Some(item_id.to_string()),
                supply_name: Some(name.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_insulin_use(
        &self,
        item_id: &str,
        name: &str,
        volume_used: f64,
        remaining: f64,
        unit: &str,
    ) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::InsulinVolumeUpdated,
            "Insulin Used",
            &format!("Used {volume_used}{unit} of {name} ({remaining}{unit} remaining)"),
            Some(HistoryMetadata {
                item_id: Some(item_id.to_string()),
                supply_name: Some(name.to_string()),
                volume_used: Some(volume_used),
                new_value: serde_json::Number::from_f64(remaining).map(serde_json::Value::Number),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_device_ended_early(&self, item_id: &str, name: &str) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::DeviceEndedEarly,
            "Device Ended Early",
            &format!("{name} was ended before its scheduled expiry"),
            Some(HistoryMetadata {
                item_id: Some(item_id.to_string()),
                supply_name: Some(name.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_timer_added(&self, timer_id: &str, name: &str) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::TimerAdded,
            "Timer Added",
            &format!("Added timer {name}"),
            Some(HistoryMetadata {
                timer_id: Some(timer_id.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_timer_reset(&self, timer_id: &str, name: &str) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::TimerReset,
            "Timer Reset",
            &format!("Restarted timer {name}"),
            Some(HistoryMetadata {
                timer_id: Some(timer_id.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_notification_sent(&self, kind: &str, message: &str) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::NotificationSent,
            "Notification Sent",
            &format!("{kind}: {message}"),
            Some(HistoryMetadata {
                notification_type: Some(kind.to_string()),
                ..HistoryMetadata::default()
            }),
        )
    }

    pub fn log_data_cleared(&self) -> Result<HistoryEvent> {
        self.record(
            HistoryEventKind::DataCleared,
            "Data Cleared",
            "All app data was cleared",
            None,
        )
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, Option<String>, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<(String, String, String, String, Option<String>, String)>>,
) -> Result<Vec<HistoryEvent>> {
    let mut events = Vec::new();
    for row in rows {
        let (id, kind, title, description, metadata, at) = row?;
        let Ok(kind) = kind.parse::<HistoryEventKind>() else {
            tracing::warn!(%kind, "skipping history row with unknown kind");
            continue;
        };
        let Ok(at) = DateTime::parse_from_rfc3339(&at) else {
            tracing::warn!(%at, "skipping history row with unparseable timestamp");
            continue;
        };
        let metadata = metadata.and_then(|json| serde_json::from_str(&json).ok());
        events.push(HistoryEvent {
            id,
            at: at.with_timezone(&Utc),
            kind,
            title,
            description,
            metadata,
        });
    }
    Ok(events)
}

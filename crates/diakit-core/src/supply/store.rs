//! Persistent store for supplies, timers, and in-use items.
//!
//! Collections live in memory and are written back as JSON blobs in the
//! kv table after every mutation, mirroring how the rest of the app state
//! is persisted. The store only manages records; reminder reconciliation
//! is driven by the caller after mutations so storage stays usable even
//! when notifications are unavailable.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{InUseItem, ItemDetails, Supply, SupplyCategory, TimerKind, UsageTimer};
use crate::error::{CoreError, Result, ValidationError};
use crate::storage::Database;

/// kv key holding the serialized supply collection.
pub const SUPPLIES_KEY: &str = "diakit-supplies";
/// kv key holding the serialized timer collection.
pub const TIMERS_KEY: &str = "diakit-timers";
/// kv key holding the serialized in-use collection.
pub const IN_USE_KEY: &str = "diakit-in-use";

/// Fields for a new supply; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyDraft {
    pub name: String,
    pub category: SupplyCategory,
    pub quantity: u32,
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub warning_threshold: Option<u32>,
}

/// Partial update for a supply. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyPatch {
    pub name: Option<String>,
    pub category: Option<SupplyCategory>,
    pub quantity: Option<u32>,
    pub expiration_date: Option<Option<DateTime<Utc>>>,
    pub notes: Option<Option<String>>,
    pub warning_threshold: Option<Option<u32>>,
}

/// Result of a supply update, carrying both versions so the caller can
/// react to the change (e.g. clear alert tracking on restock).
#[derive(Debug, Clone)]
pub struct SupplyUpdate {
    pub before: Supply,
    pub after: Supply,
}

impl SupplyUpdate {
    /// Whether the update raised the stocked quantity.
    pub fn is_restock(&self) -> bool {
        self.after.quantity > self.before.quantity
    }
}

/// Fields for a new replacement timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerDraft {
    pub name: String,
    pub kind: TimerKind,
    /// Defaults to the kind's typical interval when unset.
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for a timer. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerPatch {
    pub name: Option<String>,
    pub kind: Option<TimerKind>,
    pub duration_days: Option<u32>,
    pub notes: Option<Option<String>>,
}

/// In-memory view of the record collections, persisted through `db`.
pub struct SupplyStore<'a> {
    db: &'a Database,
    supplies: Vec<Supply>,
    timers: Vec<UsageTimer>,
    in_use: Vec<InUseItem>,
}

impl<'a> SupplyStore<'a> {
    /// Load all collections from storage.
    ///
    /// A missing blob yields an empty collection; a blob that no longer
    /// parses is discarded (and logged) rather than blocking startup.
    ///
    /// # Errors
    /// Returns an error only when the kv reads themselves fail.
    pub fn load(db: &'a Database) -> Result<Self> {
        Ok(Self {
            db,
            supplies: load_collection(db, SUPPLIES_KEY)?,
            timers: load_collection(db, TIMERS_KEY)?,
            in_use: load_collection(db, IN_USE_KEY)?,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn supplies(&self) -> &[Supply] {
        &self.supplies
    }

    pub fn timers(&self) -> &[UsageTimer] {
        &self.timers
    }

    pub fn in_use_items(&self) -> &[InUseItem] {
        &self.in_use
    }

    pub fn get_supply(&self, id: &str) -> Option<&Supply> {
        self.supplies.iter().find(|s| s.id == id)
    }

    pub fn get_timer(&self, id: &str) -> Option<&UsageTimer> {
        self.timers.iter().find(|t| t.id == id)
    }

    pub fn get_in_use(&self, id: &str) -> Option<&InUseItem> {
        self.in_use.iter().find(|i| i.id == id)
    }

    pub fn supplies_by_category(&self, category: SupplyCategory) -> Vec<&Supply> {
        self.supplies
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Supplies at or below their warning threshold.
    pub fn low_stock_supplies(&self) -> Vec<&Supply> {
        self.supplies
            .iter()
            .filter(|s| s.quantity <= s.warning_threshold_or_default())
            .collect()
    }

    // ── Supply mutations ─────────────────────────────────────────────

    /// Add a supply, assigning it a fresh id.
    pub fn add_supply(&mut self, draft: SupplyDraft) -> Result<&Supply> {
        let supply = Supply {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            category: draft.category,
            quantity: draft.quantity,
            expiration_date: draft.expiration_date,
            notes: draft.notes,
            warning_threshold: draft.warning_threshold,
        };
        self.supplies.push(supply);
        self.save_supplies()?;
        Ok(self.supplies.last().expect("just pushed"))
    }

    /// Apply a partial update to a supply.
    pub fn update_supply(&mut self, id: &str, patch: SupplyPatch) -> Result<SupplyUpdate> {
        let supply = self
            .supplies
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found("supply", id))?;
        let before = supply.clone();

        if let Some(name) = patch.name {
            supply.name = name;
        }
        if let Some(category) = patch.category {
            supply.category = category;
        }
        if let Some(quantity) = patch.quantity {
            supply.quantity = quantity;
        }
        if let Some(expiration_date) = patch.expiration_date {
            supply.expiration_date = expiration_date;
        }
        if let Some(notes) = patch.notes {
            supply.notes = notes;
        }
        if let Some(warning_threshold) = patch.warning_threshold {
            supply.warning_threshold = warning_threshold;
        }
        let after = supply.clone();

        self.save_supplies()?;
        Ok(SupplyUpdate { before, after })
    }

    /// Delete a supply, returning the removed record.
    pub fn delete_supply(&mut self, id: &str) -> Result<Supply> {
        let pos = self
            .supplies
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| not_found("supply", id))?;
        let removed = self.supplies.remove(pos);
        self.save_supplies()?;
        Ok(removed)
    }

    // ── In-use lifecycle ─────────────────────────────────────────────

    /// Transition one unit of a supply into use.
    ///
    /// Decrements the supply's quantity and creates the in-use record.
    /// Device details get an expiry computed from their wear duration and,
    /// when a grace period is given, a grace window beyond that expiry.
    pub fn start_using(
        &mut self,
        supply_id: &str,
        mut details: ItemDetails,
        grace_period_hours: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<InUseItem> {
        let supply = self
            .supplies
            .iter_mut()
            .find(|s| s.id == supply_id)
            .ok_or_else(|| not_found("supply", supply_id))?;
        if supply.quantity == 0 {
            return Err(ValidationError::OutOfStock {
                name: supply.name.clone(),
            }
            .into());
        }
        supply.quantity -= 1;
        let supply_name = supply.name.clone();
        let category = supply.category;

        if let ItemDetails::Insulin {
            total_volume,
            remaining_volume,
            ..
        } = &mut details
        {
            *remaining_volume = remaining_volume.clamp(0.0, *total_volume);
        }

        let (expires_at, grace_period_ends_at) = match details {
            ItemDetails::Device { duration_hours, .. } => {
                let expires = now + Duration::hours(i64::from(duration_hours));
                let grace_ends = grace_period_hours
                    .map(|hours| expires + Duration::hours(i64::from(hours)));
                (Some(expires), grace_ends)
            }
            ItemDetails::Insulin { .. } => (None, None),
        };

        let item = InUseItem {
            id: Uuid::new_v4().to_string(),
            supply_id: supply_id.to_string(),
            supply_name,
            category,
            started_at: now,
            expires_at,
            grace_period_hours,
            grace_period_ends_at,
            details,
        };

        self.in_use.push(item.clone());
        self.save_supplies()?;
        self.save_in_use()?;
        Ok(item)
    }

    /// Record insulin usage against an in-use item.
    ///
    /// The remaining volume never goes below zero regardless of the dose.
    pub fn record_insulin_use(&mut self, item_id: &str, volume_used: f64) -> Result<InUseItem> {
        let item = self
            .in_use
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| not_found("in-use item", item_id))?;
        match &mut item.details {
            ItemDetails::Insulin {
                remaining_volume, ..
            } => {
                *remaining_volume = (*remaining_volume - volume_used).max(0.0);
            }
            ItemDetails::Device { .. } => {
                return Err(ValidationError::InvalidValue {
                    field: "details".to_string(),
                    message: "volume can only be recorded against insulin items".to_string(),
                }
                .into());
            }
        }
        let updated = item.clone();
        self.save_in_use()?;
        Ok(updated)
    }

    /// Stop a device before its nominal expiry.
    pub fn end_device_early(&mut self, item_id: &str, now: DateTime<Utc>) -> Result<InUseItem> {
        let item = self
            .in_use
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| not_found("in-use item", item_id))?;
        match &mut item.details {
            ItemDetails::Device { ended_early, .. } => {
                *ended_early = true;
                item.expires_at = Some(now);
            }
            ItemDetails::Insulin { .. } => {
                return Err(ValidationError::InvalidValue {
                    field: "details".to_string(),
                    message: "only devices can be ended early".to_string(),
                }
                .into());
            }
        }
        let updated = item.clone();
        self.save_in_use()?;
        Ok(updated)
    }

    /// Remove an in-use item (discarded or replaced).
    pub fn remove_in_use(&mut self, item_id: &str) -> Result<InUseItem> {
        let pos = self
            .in_use
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| not_found("in-use item", item_id))?;
        let removed = self.in_use.remove(pos);
        self.save_in_use()?;
        Ok(removed)
    }

    // ── Timer mutations ──────────────────────────────────────────────

    pub fn add_timer(&mut self, draft: TimerDraft, now: DateTime<Utc>) -> Result<&UsageTimer> {
        let timer = UsageTimer {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            kind: draft.kind,
            started_at: now,
            duration_days: draft
                .duration_days
                .unwrap_or_else(|| draft.kind.default_duration_days()),
            notes: draft.notes,
        };
        self.timers.push(timer);
        self.save_timers()?;
        Ok(self.timers.last().expect("just pushed"))
    }

    pub fn update_timer(&mut self, id: &str, patch: TimerPatch) -> Result<UsageTimer> {
        let timer = self
            .timers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("timer", id))?;
        if let Some(name) = patch.name {
            timer.name = name;
        }
        if let Some(kind) = patch.kind {
            timer.kind = kind;
        }
        if let Some(duration_days) = patch.duration_days {
            timer.duration_days = duration_days;
        }
        if let Some(notes) = patch.notes {
            timer.notes = notes;
        }
        let updated = timer.clone();
        self.save_timers()?;
        Ok(updated)
    }

    pub fn delete_timer(&mut self, id: &str) -> Result<UsageTimer> {
        let pos = self
            .timers
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| not_found("timer", id))?;
        let removed = self.timers.remove(pos);
        self.save_timers()?;
        Ok(removed)
    }

    /// Restart a timer's countdown from `now`.
    pub fn reset_timer(&mut self, id: &str, now: DateTime<Utc>) -> Result<UsageTimer> {
        let timer = self
            .timers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found("timer", id))?;
        timer.started_at = now;
        let updated = timer.clone();
        self.save_timers()?;
        Ok(updated)
    }

    // ── Bulk ─────────────────────────────────────────────────────────

    /// Remove every record collection from storage and memory.
    pub fn clear_all(&mut self) -> Result<()> {
        self.db.kv_remove(SUPPLIES_KEY)?;
        self.db.kv_remove(TIMERS_KEY)?;
        self.db.kv_remove(IN_USE_KEY)?;
        self.supplies.clear();
        self.timers.clear();
        self.in_use.clear();
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn save_supplies(&self) -> Result<()> {
        save_collection(self.db, SUPPLIES_KEY, &self.supplies)
    }

    fn save_timers(&self) -> Result<()> {
        save_collection(self.db, TIMERS_KEY, &self.timers)
    }

    fn save_in_use(&self) -> Result<()> {
        save_collection(self.db, IN_USE_KEY, &self.in_use)
    }
}

fn not_found(kind: &'static str, id: &str) -> CoreError {
    ValidationError::NotFound {
        kind,
        id: id.to_string(),
    }
    .into()
}

fn load_collection<T: serde::de::DeserializeOwned>(db: &Database, key: &str) -> Result<Vec<T>> {
    match db.kv_get(key)? {
        Some(json) => match serde_json::from_str(&json) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unparseable record blob");
                Ok(Vec::new())
            }
        },
        None => Ok(Vec::new()),
    }
}

fn save_collection<T: Serialize>(db: &Database, key: &str, items: &[T]) -> Result<()> {
    let json = serde_json::to_string(items)?;
    db.kv_set(key, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::supply::VolumeUnit;

    fn draft(name: &str, quantity: u32) -> SupplyDraft {
        SupplyDraft {
            name: name.to_string(),
            category: SupplyCategory::Insulin,
            quantity,
            expiration_date: None,
            notes: None,
            warning_threshold: None,
        }
    }

    fn insulin(total: f64, remaining: f64) -> ItemDetails {
        ItemDetails::Insulin {
            total_volume: total,
            remaining_volume: remaining,
            unit: VolumeUnit::Units,
        }
    }

    #[test]
    fn add_and_reload_supplies() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let id = store.add_supply(draft("Humalog", 4)).unwrap().id.clone();

        let store = SupplyStore::load(&db).unwrap();
        let supply = store.get_supply(&id).unwrap();
        assert_eq!(supply.name, "Humalog");
        assert_eq!(supply.quantity, 4);
    }

    #[test]
    fn start_using_decrements_quantity() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let id = store.add_supply(draft("Humalog", 2)).unwrap().id.clone();

        let item = store
            .start_using(&id, insulin(1000.0, 1000.0), None, Utc::now())
            .unwrap();
        assert_eq!(store.get_supply(&id).unwrap().quantity, 1);
        assert_eq!(item.supply_name, "Humalog");
        assert!(item.expires_at.is_none());

        store
            .start_using(&id, insulin(1000.0, 1000.0), None, Utc::now())
            .unwrap();
        let err = store
            .start_using(&id, insulin(1000.0, 1000.0), None, Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfStock { .. })
        ));
    }

    #[test]
    fn device_gets_expiry_and_grace_window() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let id = store
            .add_supply(SupplyDraft {
                category: SupplyCategory::Cgm,
                ..draft("G7 Sensor", 3)
            })
            .unwrap()
            .id
            .clone();

        let now = Utc::now();
        let item = store
            .start_using(
                &id,
                ItemDetails::Device {
                    duration_hours: 240,
                    ended_early: false,
                },
                Some(12),
                now,
            )
            .unwrap();
        let expires = item.expires_at.unwrap();
        assert_eq!(expires, now + Duration::hours(240));
        assert_eq!(
            item.grace_period_ends_at.unwrap(),
            expires + Duration::hours(12)
        );
    }

    #[test]
    fn insulin_volume_clamps_at_zero() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let id = store.add_supply(draft("Humalog", 1)).unwrap().id.clone();
        let item = store
            .start_using(&id, insulin(1000.0, 1000.0), None, Utc::now())
            .unwrap();

        let item = store.record_insulin_use(&item.id, 250.0).unwrap();
        match item.details {
            ItemDetails::Insulin {
                remaining_volume, ..
            } => assert_eq!(remaining_volume, 750.0),
            _ => panic!("expected insulin details"),
        }

        let item = store.record_insulin_use(&item.id, 900.0).unwrap();
        match item.details {
            ItemDetails::Insulin {
                remaining_volume, ..
            } => assert_eq!(remaining_volume, 0.0),
            _ => panic!("expected insulin details"),
        }
    }

    #[test]
    fn end_device_early_stamps_expiry() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let id = store
            .add_supply(SupplyDraft {
                category: SupplyCategory::InfusionSets,
                ..draft("Quick-set", 1)
            })
            .unwrap()
            .id
            .clone();
        let started = Utc::now();
        let item = store
            .start_using(
                &id,
                ItemDetails::Device {
                    duration_hours: 72,
                    ended_early: false,
                },
                None,
                started,
            )
            .unwrap();

        let ended = started + Duration::hours(10);
        let item = store.end_device_early(&item.id, ended).unwrap();
        assert_eq!(item.expires_at, Some(ended));
        assert!(matches!(
            item.details,
            ItemDetails::Device { ended_early: true, .. }
        ));
        assert!(!item.is_active_device());
    }

    #[test]
    fn update_reports_restock() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let id = store.add_supply(draft("Strips", 2)).unwrap().id.clone();

        let update = store
            .update_supply(
                &id,
                SupplyPatch {
                    quantity: Some(10),
                    ..SupplyPatch::default()
                },
            )
            .unwrap();
        assert!(update.is_restock());

        let update = store
            .update_supply(
                &id,
                SupplyPatch {
                    quantity: Some(3),
                    ..SupplyPatch::default()
                },
            )
            .unwrap();
        assert!(!update.is_restock());
    }

    #[test]
    fn low_stock_uses_per_supply_threshold() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        store.add_supply(draft("Below default", 5)).unwrap();
        store
            .add_supply(SupplyDraft {
                warning_threshold: Some(2),
                ..draft("Own threshold", 5)
            })
            .unwrap();

        let low: Vec<&str> = store
            .low_stock_supplies()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(low, vec!["Below default"]);
    }

    #[test]
    fn timer_defaults_by_kind_and_resets() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let start = Utc::now();
        let id = store
            .add_timer(
                TimerDraft {
                    name: "Sensor change".to_string(),
                    kind: TimerKind::Cgm,
                    duration_days: None,
                    notes: None,
                },
                start,
            )
            .unwrap()
            .id
            .clone();
        assert_eq!(store.get_timer(&id).unwrap().duration_days, 10);

        let later = start + Duration::days(4);
        let timer = store.reset_timer(&id, later).unwrap();
        assert_eq!(timer.started_at, later);
    }

    #[test]
    fn clear_all_wipes_collections_and_blobs() {
        let db = Database::open_memory().unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        let id = store.add_supply(draft("Humalog", 3)).unwrap().id.clone();
        store
            .start_using(&id, insulin(1000.0, 1000.0), None, Utc::now())
            .unwrap();

        store.clear_all().unwrap();
        assert!(store.supplies().is_empty());
        assert!(store.in_use_items().is_empty());
        assert!(db.kv_get(SUPPLIES_KEY).unwrap().is_none());
        assert!(db.kv_get(IN_USE_KEY).unwrap().is_none());
    }

    #[test]
    fn malformed_blob_falls_back_to_empty() {
        let db = Database::open_memory().unwrap();
        db.kv_set(SUPPLIES_KEY, "not json at all").unwrap();
        let store = SupplyStore::load(&db).unwrap();
        assert!(store.supplies().is_empty());
    }

    proptest! {
        #[test]
        fn remaining_volume_never_negative(doses in proptest::collection::vec(0.0f64..500.0, 1..20)) {
            let db = Database::open_memory().unwrap();
            let mut store = SupplyStore::load(&db).unwrap();
            let id = store.add_supply(draft("Humalog", 1)).unwrap().id.clone();
            let item = store
                .start_using(&id, insulin(1000.0, 1000.0), None, Utc::now())
                .unwrap();

            for dose in doses {
                let item = store.record_insulin_use(&item.id, dose).unwrap();
                match item.details {
                    ItemDetails::Insulin { remaining_volume, total_volume, .. } => {
                        prop_assert!(remaining_volume >= 0.0);
                        prop_assert!(remaining_volume <= total_volume);
                    }
                    _ => prop_assert!(false, "expected insulin details"),
                }
            }
        }
    }
}

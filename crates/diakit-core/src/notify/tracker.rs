//! Dedup tracking for already-delivered alerts.
//!
//! Immediate alerts must not repeat on every reconcile pass, so delivered
//! identifiers are remembered in a persisted set. Entries leave the set
//! when the underlying condition is cleared (restock, deletion), when the
//! supply is no longer low at all, or wholesale once the set has not been
//! touched for 24 hours -- stale suppression eventually re-alerts rather
//! than silencing a condition forever.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::key::AlertKey;
use crate::error::Result;
use crate::storage::Database;

/// kv key holding the serialized tracker blob.
pub const TRACKER_KEY: &str = "diakit-sent-alerts";

/// Entire set is dropped when untouched for longer than this.
pub const STALE_AFTER_HOURS: i64 = 24;

#[derive(Serialize, Deserialize)]
struct TrackerBlob {
    sent: Vec<String>,
    /// Epoch seconds of the last mutation.
    last_update: i64,
}

/// The set of alert identifiers already delivered, plus when it was last
/// touched.
#[derive(Debug, Clone)]
pub struct SentAlerts {
    sent: HashSet<AlertKey>,
    last_update: DateTime<Utc>,
}

impl SentAlerts {
    /// An empty tracker stamped at `now`.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            sent: HashSet::new(),
            last_update: now,
        }
    }

    /// Load the persisted tracker, clearing it when stale.
    ///
    /// Any failure -- unreadable kv, unparseable blob -- degrades to an
    /// empty tracker; worst case a duplicate alert fires once. Individual
    /// identifiers that no longer parse are skipped.
    pub fn load_or_reset(db: &Database, now: DateTime<Utc>) -> Self {
        let blob = match db.kv_get(TRACKER_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<TrackerBlob>(&json) {
                Ok(blob) => blob,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unparseable alert tracker blob");
                    return Self::empty(now);
                }
            },
            Ok(None) => return Self::empty(now),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read alert tracker, starting empty");
                return Self::empty(now);
            }
        };

        let last_update = match DateTime::from_timestamp(blob.last_update, 0) {
            Some(ts) => ts,
            None => return Self::empty(now),
        };
        if now - last_update > Duration::hours(STALE_AFTER_HOURS) {
            return Self::empty(now);
        }

        let sent = blob
            .sent
            .iter()
            .filter_map(|raw| match raw.parse::<AlertKey>() {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unrecognized tracked alert id");
                    None
                }
            })
            .collect();
        Self { sent, last_update }
    }

    /// Persist the current set.
    ///
    /// # Errors
    /// Returns an error if serialization or the kv write fails.
    pub fn save(&self, db: &Database) -> Result<()> {
        let blob = TrackerBlob {
            sent: self.sent.iter().map(AlertKey::to_string).collect(),
            last_update: self.last_update.timestamp(),
        };
        let json = serde_json::to_string(&blob)?;
        db.kv_set(TRACKER_KEY, &json)?;
        Ok(())
    }

    pub fn has_been_sent(&self, key: &AlertKey) -> bool {
        self.sent.contains(key)
    }

    /// Remember a delivered alert. The set is updated immediately so a
    /// re-entrant reconcile pass cannot double-schedule the identifier
    /// while persistence is still pending.
    pub fn mark_sent(&mut self, key: AlertKey, now: DateTime<Utc>) {
        self.sent.insert(key);
        self.last_update = now;
    }

    /// Drop every identifier referring to the given supply. Returns how
    /// many were removed.
    pub fn clear_for_supply(&mut self, supply_id: &str, now: DateTime<Utc>) -> usize {
        let before = self.sent.len();
        self.sent.retain(|key| key.subject_id() != supply_id);
        let removed = before - self.sent.len();
        if removed > 0 {
            self.last_update = now;
        }
        removed
    }

    /// Drop low-stock identifiers for supplies that are no longer low, so
    /// a future recurrence re-alerts.
    pub fn prune_stale(&mut self, current_low_stock_ids: &HashSet<&str>, now: DateTime<Utc>) {
        let before = self.sent.len();
        self.sent.retain(|key| match key {
            AlertKey::LowStock { supply_id, .. } => {
                current_low_stock_ids.contains(supply_id.as_str())
            }
            _ => true,
        });
        if self.sent.len() != before {
            self.last_update = now;
        }
    }

    /// Full wipe.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.sent.clear();
        self.last_update = now;
    }

    /// Iterate the currently tracked keys.
    pub fn keys(&self) -> impl Iterator<Item = &AlertKey> {
        self.sent.iter()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low(supply_id: &str, quantity: u32) -> AlertKey {
        AlertKey::LowStock {
            supply_id: supply_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn mark_and_query() {
        let now = Utc::now();
        let mut tracker = SentAlerts::empty(now);
        assert!(!tracker.has_been_sent(&low("s1", 3)));
        tracker.mark_sent(low("s1", 3), now);
        assert!(tracker.has_been_sent(&low("s1", 3)));
        // A different quantity is a different alert.
        assert!(!tracker.has_been_sent(&low("s1", 2)));
    }

    #[test]
    fn persists_and_reloads() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let mut tracker = SentAlerts::empty(now);
        tracker.mark_sent(low("s1", 3), now);
        tracker.mark_sent(
            AlertKey::Expiration {
                supply_id: "s2".to_string(),
            },
            now,
        );
        tracker.save(&db).unwrap();

        let loaded = SentAlerts::load_or_reset(&db, now);
        assert_eq!(loaded.len(), 2);
        assert!(loaded.has_been_sent(&low("s1", 3)));
    }

    #[test]
    fn stale_tracker_loads_empty() {
        let db = Database::open_memory().unwrap();
        let then = Utc::now() - Duration::hours(STALE_AFTER_HOURS + 1);
        let mut tracker = SentAlerts::empty(then);
        tracker.mark_sent(low("s1", 3), then);
        tracker.save(&db).unwrap();

        let loaded = SentAlerts::load_or_reset(&db, Utc::now());
        assert!(loaded.is_empty());
    }

    #[test]
    fn fresh_tracker_survives_load() {
        let db = Database::open_memory().unwrap();
        let then = Utc::now() - Duration::hours(STALE_AFTER_HOURS - 1);
        let mut tracker = SentAlerts::empty(then);
        tracker.mark_sent(low("s1", 3), then);
        tracker.save(&db).unwrap();

        let loaded = SentAlerts::load_or_reset(&db, Utc::now());
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn malformed_blob_loads_empty() {
        let db = Database::open_memory().unwrap();
        db.kv_set(TRACKER_KEY, "[1, 2, 3]").unwrap();
        let loaded = SentAlerts::load_or_reset(&db, Utc::now());
        assert!(loaded.is_empty());
    }

    #[test]
    fn unrecognized_ids_are_skipped_not_fatal() {
        let db = Database::open_memory().unwrap();
        let blob = format!(
            r#"{{"sent": ["low-stock-s1-3", "mystery-id"], "last_update": {}}}"#,
            Utc::now().timestamp()
        );
        db.kv_set(TRACKER_KEY, &blob).unwrap();
        let loaded = SentAlerts::load_or_reset(&db, Utc::now());
        assert_eq!(loaded.len(), 1);
        assert!(loaded.has_been_sent(&low("s1", 3)));
    }

    #[test]
    fn clear_for_supply_matches_whole_id_only() {
        let now = Utc::now();
        let mut tracker = SentAlerts::empty(now);
        tracker.mark_sent(low("12", 3), now);
        tracker.mark_sent(low("123", 3), now);
        tracker.mark_sent(
            AlertKey::Expiration {
                supply_id: "123".to_string(),
            },
            now,
        );

        let removed = tracker.clear_for_supply("123", now);
        assert_eq!(removed, 2);
        assert!(tracker.has_been_sent(&low("12", 3)));
        assert!(!tracker.has_been_sent(&low("123", 3)));
    }

    #[test]
    fn prune_keeps_only_still_low_supplies() {
        let now = Utc::now();
        let mut tracker = SentAlerts::empty(now);
        tracker.mark_sent(low("s1", 2), now);
        tracker.mark_sent(low("s2", 1), now);
        tracker.mark_sent(
            AlertKey::DeviceReminder {
                item_id: "i1".to_string(),
            },
            now,
        );

        let still_low: HashSet<&str> = ["s1"].into_iter().collect();
        tracker.prune_stale(&still_low, now);

        assert!(tracker.has_been_sent(&low("s1", 2)));
        assert!(!tracker.has_been_sent(&low("s2", 1)));
        // Non-low-stock keys are untouched by pruning.
        assert_eq!(tracker.len(), 2);
    }
}

//! Reminder evaluation and scheduling.
//!
//! The engine recomputes the full set of due reminders from the current
//! records whenever they change, then drives the delivery seam:
//! immediate alerts (low stock, expiration) are deduplicated through
//! [`SentAlerts`]; device alerts are armed as single-shot future
//! deliveries and simply re-armed on the next pass.
//!
//! Reminders are best-effort throughout. A platform without notification
//! support, a declined permission prompt, or a failed tracker write never
//! surfaces as an error to record CRUD.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::delivery::{NotificationDelivery, Trigger};
use super::key::AlertKey;
use super::settings::{ReminderSettings, SettingsPatch};
use super::tracker::SentAlerts;
use crate::error::Result;
use crate::storage::Database;
use crate::supply::{InUseItem, Supply};

/// A reminder that should be issued now.
///
/// `trigger: None` is an immediate alert; otherwise the alert is armed
/// for a future instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueAlert {
    pub key: AlertKey,
    pub title: String,
    pub body: String,
    pub trigger: Option<Trigger>,
}

impl DueAlert {
    pub fn is_immediate(&self) -> bool {
        self.trigger.is_none()
    }
}

/// Computes due reminders and drives the notification delivery seam.
///
/// Constructed explicitly with its collaborators; holds the loaded
/// settings and dedup tracker for the session.
pub struct ReminderEngine<'a> {
    db: &'a Database,
    delivery: &'a dyn NotificationDelivery,
    settings: ReminderSettings,
    tracker: SentAlerts,
    permitted: bool,
}

impl<'a> ReminderEngine<'a> {
    /// Load settings and tracker state and ask the platform for
    /// notification permission.
    pub fn new(db: &'a Database, delivery: &'a dyn NotificationDelivery) -> Self {
        Self::new_at(db, delivery, Utc::now())
    }

    /// As [`ReminderEngine::new`] with an explicit load instant.
    pub fn new_at(
        db: &'a Database,
        delivery: &'a dyn NotificationDelivery,
        now: DateTime<Utc>,
    ) -> Self {
        let settings = ReminderSettings::load(db);
        let tracker = SentAlerts::load_or_reset(db, now);
        let permitted = delivery.request_permissions();
        Self {
            db,
            delivery,
            settings,
            tracker,
            permitted,
        }
    }

    pub fn settings(&self) -> &ReminderSettings {
        &self.settings
    }

    /// Merge a partial settings update and persist the result.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<&ReminderSettings> {
        self.settings.apply(patch);
        self.settings.save(self.db)?;
        Ok(&self.settings)
    }

    /// The current dedup state (for inspection).
    pub fn tracker(&self) -> &SentAlerts {
        &self.tracker
    }

    // ── Evaluators ───────────────────────────────────────────────────

    /// Immediate low-stock alerts not yet delivered for their current
    /// quantity. Also prunes dedup entries for supplies no longer low.
    pub fn evaluate_low_stock(&mut self, supplies: &[Supply], now: DateTime<Utc>) -> Vec<DueAlert> {
        if !self.settings.low_stock_enabled {
            return Vec::new();
        }

        let low: Vec<&Supply> = supplies
            .iter()
            .filter(|s| {
                s.quantity
                    <= s.warning_threshold
                        .unwrap_or(self.settings.low_stock_threshold)
            })
            .collect();

        let due = low
            .iter()
            .filter_map(|supply| {
                let key = AlertKey::LowStock {
                    supply_id: supply.id.clone(),
                    quantity: supply.quantity,
                };
                if self.tracker.has_been_sent(&key) {
                    return None;
                }
                Some(DueAlert {
                    key,
                    title: "Low Stock Alert".to_string(),
                    body: format!(
                        "{} is running low ({} remaining)",
                        supply.name, supply.quantity
                    ),
                    trigger: None,
                })
            })
            .collect();

        let low_ids: HashSet<&str> = low.iter().map(|s| s.id.as_str()).collect();
        self.tracker.prune_stale(&low_ids, now);

        due
    }

    /// Immediate expiration warnings for supplies expiring within the
    /// configured window. One alert per supply per dedup window.
    pub fn evaluate_expiration(&self, supplies: &[Supply], now: DateTime<Utc>) -> Vec<DueAlert> {
        if !self.settings.expiration_enabled {
            return Vec::new();
        }

        supplies
            .iter()
            .filter_map(|supply| {
                let expiration_date = supply.expiration_date?;
                let days_until = days_until_ceil(now, expiration_date);
                if days_until <= 0 || days_until > self.settings.expiration_days {
                    return None;
                }
                let key = AlertKey::Expiration {
                    supply_id: supply.id.clone(),
                };
                if self.tracker.has_been_sent(&key) {
                    return None;
                }
                let unit = if days_until == 1 { "day" } else { "days" };
                Some(DueAlert {
                    key,
                    title: "Expiration Warning".to_string(),
                    body: format!("{} expires in {days_until} {unit}", supply.name),
                    trigger: None,
                })
            })
            .collect()
    }

    /// Future-trigger alerts for devices currently counting down: a
    /// reminder ahead of expiry, the expiry itself, and the end of the
    /// grace window. Not gated by the dedup tracker; re-arming the same
    /// identifier supersedes the pending delivery.
    pub fn evaluate_device_timers(
        &self,
        in_use: &[InUseItem],
        now: DateTime<Utc>,
    ) -> Vec<DueAlert> {
        if !self.settings.device_timer_enabled {
            return Vec::new();
        }

        let mut due = Vec::new();
        for item in in_use.iter().filter(|i| i.is_active_device()) {
            let Some(expires_at) = item.expires_at else {
                continue;
            };

            // Armed ahead of time so that at the delivery instant the
            // device has exactly the configured number of hours left.
            // Devices already inside the reminder window get no separate
            // reminder; the expiry alert covers them.
            let remind_at = expires_at - Duration::hours(self.settings.device_reminder_hours);
            if expires_at > now && remind_at > now {
                due.push(DueAlert {
                    key: AlertKey::DeviceReminder {
                        item_id: item.id.clone(),
                    },
                    title: "Device Reminder".to_string(),
                    body: format!(
                        "{} will expire in {} hours",
                        item.supply_name, self.settings.device_reminder_hours
                    ),
                    trigger: Some(Trigger::At(remind_at)),
                });
            }

            if expires_at > now {
                due.push(DueAlert {
                    key: AlertKey::DeviceExpiry {
                        item_id: item.id.clone(),
                    },
                    title: "Device Expired".to_string(),
                    body: format!(
                        "{} has expired and should be replaced",
                        item.supply_name
                    ),
                    trigger: Some(Trigger::At(expires_at)),
                });
            }

            if let Some(grace_ends_at) = item.grace_period_ends_at {
                if grace_ends_at > now {
                    due.push(DueAlert {
                        key: AlertKey::GracePeriodEnd {
                            item_id: item.id.clone(),
                        },
                        title: "Grace Period Ending".to_string(),
                        body: format!(
                            "{} grace period is ending - replace immediately",
                            item.supply_name
                        ),
                        trigger: Some(Trigger::At(grace_ends_at)),
                    });
                }
            }
        }
        due
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Recompute all due reminders and issue the delivery calls.
    ///
    /// Returns the due set (mostly useful to callers that mirror alerts
    /// into the history log). Never fails on delivery or persistence
    /// problems; without notification permission it issues nothing.
    pub fn reconcile(&mut self, supplies: &[Supply], in_use: &[InUseItem]) -> Vec<DueAlert> {
        self.reconcile_at(supplies, in_use, Utc::now())
    }

    /// As [`ReminderEngine::reconcile`] with an explicit instant.
    pub fn reconcile_at(
        &mut self,
        supplies: &[Supply],
        in_use: &[InUseItem],
        now: DateTime<Utc>,
    ) -> Vec<DueAlert> {
        if !self.permitted {
            return Vec::new();
        }

        let mut due = self.evaluate_low_stock(supplies, now);
        due.extend(self.evaluate_expiration(supplies, now));
        due.extend(self.evaluate_device_timers(in_use, now));

        for alert in &due {
            match alert.trigger {
                None => {
                    // The tracker entry lands before the next reconcile
                    // pass can run, so an identifier is only ever
                    // delivered once per dedup window.
                    if self
                        .delivery
                        .schedule(&alert.title, &alert.body, None, &alert.key)
                        .is_some()
                    {
                        self.tracker.mark_sent(alert.key.clone(), now);
                    }
                }
                Some(trigger) => {
                    self.delivery.cancel(&alert.key);
                    self.delivery
                        .schedule(&alert.title, &alert.body, Some(trigger), &alert.key);
                }
            }
        }

        if let Err(e) = self.tracker.save(self.db) {
            tracing::warn!(error = %e, "failed to persist alert tracker");
        }

        due
    }

    // ── Clearing and cancellation ────────────────────────────────────

    /// Forget delivered alerts for a supply so future occurrences
    /// re-alert. Call on restock or deletion.
    pub fn clear_for_supply(&mut self, supply_id: &str) {
        let removed = self.tracker.clear_for_supply(supply_id, Utc::now());
        if removed > 0 {
            if let Err(e) = self.tracker.save(self.db) {
                tracing::warn!(error = %e, "failed to persist alert tracker");
            }
        }
    }

    /// Cancel any pending supply-scoped deliveries.
    pub fn cancel_for_supply(&self, supply_id: &str) {
        self.delivery.cancel(&AlertKey::Expiration {
            supply_id: supply_id.to_string(),
        });
        for key in self.tracker.keys() {
            if key.is_low_stock() && key.subject_id() == supply_id {
                self.delivery.cancel(key);
            }
        }
    }

    /// Cancel the three device-scoped deliveries for an in-use item.
    pub fn cancel_for_in_use_item(&self, item_id: &str) {
        let item_id = item_id.to_string();
        self.delivery.cancel(&AlertKey::DeviceReminder {
            item_id: item_id.clone(),
        });
        self.delivery.cancel(&AlertKey::DeviceExpiry {
            item_id: item_id.clone(),
        });
        self.delivery.cancel(&AlertKey::GracePeriodEnd { item_id });
    }

    /// Wipe dedup state and cancel every pending delivery. Used by
    /// "clear all data".
    ///
    /// # Errors
    /// Returns an error if the emptied tracker cannot be persisted.
    pub fn reset_tracking(&mut self) -> Result<()> {
        self.delivery.cancel_all();
        self.tracker.reset(Utc::now());
        self.tracker.save(self.db)
    }
}

fn days_until_ceil(now: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    let secs = (later - now).num_seconds();
    (secs + 86_399).div_euclid(86_400)
}

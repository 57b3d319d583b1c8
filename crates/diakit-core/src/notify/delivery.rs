//! Seam to the platform notification facility.
//!
//! The engine only ever talks to this trait; the desktop shell, the CLI,
//! and tests each plug in their own implementation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::key::AlertKey;

/// When a notification should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    /// Deliver at an absolute instant.
    At(DateTime<Utc>),
}

/// Platform notification delivery.
///
/// Contract notes:
/// - `schedule` with `trigger: None` delivers immediately; with a trigger
///   it arms a single-shot future delivery.
/// - Scheduling under an identifier that is already armed replaces the
///   pending delivery (the engine additionally cancels before re-arming,
///   so implementations without replace semantics still end up with a
///   single pending delivery per identifier).
/// - `schedule` returns `None` when the platform has no notification
///   support or the user declined permission. That is a normal outcome,
///   not an error; callers must carry on.
pub trait NotificationDelivery {
    fn schedule(
        &self,
        title: &str,
        body: &str,
        trigger: Option<Trigger>,
        key: &AlertKey,
    ) -> Option<String>;

    /// Cancel a pending delivery. Unknown identifiers are a no-op.
    fn cancel(&self, key: &AlertKey);

    /// Cancel every pending delivery.
    fn cancel_all(&self);

    /// Ask the platform for permission to notify. `false` disables all
    /// scheduling for the session.
    fn request_permissions(&self) -> bool;
}

/// Delivery for platforms without notification support. Never schedules,
/// never errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelivery;

impl NotificationDelivery for NoopDelivery {
    fn schedule(
        &self,
        _title: &str,
        _body: &str,
        _trigger: Option<Trigger>,
        _key: &AlertKey,
    ) -> Option<String> {
        None
    }

    fn cancel(&self, _key: &AlertKey) {}

    fn cancel_all(&self) {}

    fn request_permissions(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_delivery_reports_unavailable() {
        let delivery = NoopDelivery;
        assert!(!delivery.request_permissions());
        let key = AlertKey::Expiration {
            supply_id: "s1".to_string(),
        };
        assert!(delivery.schedule("t", "b", None, &key).is_none());
        delivery.cancel(&key);
        delivery.cancel_all();
    }
}

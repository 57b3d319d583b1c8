//! Derived display state for timers and in-use items.
//!
//! Nothing here is stored. Callers pass the current instant and re-invoke
//! whenever they need a fresh value (once a second for a countdown view,
//! or once per reconcile pass).

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{InUseItem, UsageTimer};

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Progress of a replacement timer at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    pub days_passed: i64,
    pub days_remaining: i64,
    pub is_expired: bool,
    pub is_warning: bool,
}

impl TimerStatus {
    /// Compute the timer's progress at `now`.
    ///
    /// `days_passed` is the floor of elapsed whole days; the warning flag
    /// is raised only on the final remaining day, never once expired.
    pub fn compute(timer: &UsageTimer, now: DateTime<Utc>) -> Self {
        let days_passed = (now - timer.started_at).num_seconds().div_euclid(SECS_PER_DAY);
        let days_remaining = i64::from(timer.duration_days) - days_passed;
        Self {
            days_passed,
            days_remaining,
            is_expired: days_remaining <= 0,
            is_warning: days_remaining == 1,
        }
    }
}

/// Countdown state of an in-use item at a given instant.
///
/// Only devices still counting down produce a remaining time; insulin
/// items and early-ended devices report all fields inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InUseStatus {
    pub time_remaining_secs: Option<i64>,
    pub is_expired: bool,
    pub is_in_grace_period: bool,
    pub grace_remaining_secs: Option<i64>,
}

impl InUseStatus {
    const INACTIVE: InUseStatus = InUseStatus {
        time_remaining_secs: None,
        is_expired: false,
        is_in_grace_period: false,
        grace_remaining_secs: None,
    };

    /// Compute the countdown state of `item` at `now`.
    pub fn compute(item: &InUseItem, now: DateTime<Utc>) -> Self {
        if !item.is_active_device() {
            return Self::INACTIVE;
        }
        let Some(expires_at) = item.expires_at else {
            return Self::INACTIVE;
        };

        if now < expires_at {
            return Self {
                time_remaining_secs: Some((expires_at - now).num_seconds()),
                ..Self::INACTIVE
            };
        }

        let mut status = Self {
            is_expired: true,
            ..Self::INACTIVE
        };
        if let Some(grace_ends_at) = item.grace_period_ends_at {
            if now < grace_ends_at {
                status.is_in_grace_period = true;
                status.grace_remaining_secs = Some((grace_ends_at - now).num_seconds());
            }
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::supply::{ItemDetails, SupplyCategory, TimerKind, VolumeUnit};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn timer(duration_days: u32) -> UsageTimer {
        UsageTimer {
            id: "t1".to_string(),
            name: "Sensor".to_string(),
            kind: TimerKind::Cgm,
            started_at: at(0),
            duration_days,
            notes: None,
        }
    }

    fn device_item(expires_at: DateTime<Utc>, grace_ends_at: Option<DateTime<Utc>>) -> InUseItem {
        InUseItem {
            id: "i1".to_string(),
            supply_id: "s1".to_string(),
            supply_name: "Sensor".to_string(),
            category: SupplyCategory::Cgm,
            started_at: at(0),
            expires_at: Some(expires_at),
            grace_period_hours: Some(12),
            grace_period_ends_at: grace_ends_at,
            details: ItemDetails::Device {
                duration_hours: 240,
                ended_early: false,
            },
        }
    }

    #[test]
    fn timer_day_counting_truncates() {
        let t = timer(10);
        let status = TimerStatus::compute(&t, at(0));
        assert_eq!(status.days_passed, 0);
        assert_eq!(status.days_remaining, 10);

        // 2 days 23 hours in: still counts as 2 full days passed.
        let status = TimerStatus::compute(&t, at(2 * 86_400 + 23 * 3_600));
        assert_eq!(status.days_passed, 2);
        assert_eq!(status.days_remaining, 8);
        assert!(!status.is_expired);
        assert!(!status.is_warning);
    }

    #[test]
    fn timer_warns_only_on_last_day() {
        let t = timer(10);
        let status = TimerStatus::compute(&t, at(9 * 86_400));
        assert_eq!(status.days_remaining, 1);
        assert!(status.is_warning);
        assert!(!status.is_expired);

        let status = TimerStatus::compute(&t, at(10 * 86_400));
        assert_eq!(status.days_remaining, 0);
        assert!(!status.is_warning);
        assert!(status.is_expired);

        let status = TimerStatus::compute(&t, at(12 * 86_400));
        assert_eq!(status.days_remaining, -2);
        assert!(!status.is_warning);
        assert!(status.is_expired);
    }

    #[test]
    fn grace_period_transition() {
        let expiry = at(1_000);
        let grace = Duration::hours(12);
        let item = device_item(expiry, Some(expiry + grace));

        // One second before expiry: counting down.
        let status = InUseStatus::compute(&item, expiry - Duration::seconds(1));
        assert!(!status.is_expired);
        assert_eq!(status.time_remaining_secs, Some(1));
        assert!(!status.is_in_grace_period);

        // One second after expiry: expired, inside the grace window.
        let status = InUseStatus::compute(&item, expiry + Duration::seconds(1));
        assert!(status.is_expired);
        assert_eq!(status.time_remaining_secs, None);
        assert!(status.is_in_grace_period);
        assert_eq!(
            status.grace_remaining_secs,
            Some(grace.num_seconds() - 1)
        );

        // One second past the grace window: expired, no grace.
        let status = InUseStatus::compute(&item, expiry + grace + Duration::seconds(1));
        assert!(status.is_expired);
        assert!(!status.is_in_grace_period);
        assert_eq!(status.grace_remaining_secs, None);
    }

    #[test]
    fn expired_without_grace_window() {
        let expiry = at(1_000);
        let item = device_item(expiry, None);
        let status = InUseStatus::compute(&item, expiry + Duration::seconds(5));
        assert!(status.is_expired);
        assert!(!status.is_in_grace_period);
        assert_eq!(status.grace_remaining_secs, None);
    }

    #[test]
    fn insulin_and_ended_devices_are_inactive() {
        let mut item = device_item(at(1_000), None);
        item.details = ItemDetails::Insulin {
            total_volume: 300.0,
            remaining_volume: 150.0,
            unit: VolumeUnit::Units,
        };
        assert_eq!(InUseStatus::compute(&item, at(0)), InUseStatus::INACTIVE);

        let mut item = device_item(at(1_000), None);
        item.details = ItemDetails::Device {
            duration_hours: 240,
            ended_early: true,
        };
        assert_eq!(InUseStatus::compute(&item, at(2_000)), InUseStatus::INACTIVE);
    }
}

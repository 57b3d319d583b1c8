//! Integration tests for record persistence and the history log.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use diakit_core::{
    Database, HistoryEventKind, HistoryLog, InUseStatus, ItemDetails, SupplyCategory, SupplyDraft,
    SupplyPatch, SupplyStore, TimerDraft, TimerKind, TimerStatus, VolumeUnit,
};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[test]
fn records_survive_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("diakit.db");

    let supply_id;
    let item_id;
    {
        let db = Database::open_at(&path).unwrap();
        let mut store = SupplyStore::load(&db).unwrap();
        supply_id = store
            .add_supply(SupplyDraft {
                name: "G7 Sensor".to_string(),
                category: SupplyCategory::Cgm,
                quantity: 3,
                expiration_date: None,
                notes: Some("fridge drawer".to_string()),
                warning_threshold: Some(2),
            })
            .unwrap()
            .id
            .clone();
        item_id = store
            .start_using(
                &supply_id,
                ItemDetails::Device {
                    duration_hours: 240,
                    ended_early: false,
                },
                Some(12),
                at(0),
            )
            .unwrap()
            .id;
        store
            .add_timer(
                TimerDraft {
                    name: "Site change".to_string(),
                    kind: TimerKind::InfusionSet,
                    duration_days: None,
                    notes: None,
                },
                at(0),
            )
            .unwrap();
    }

    let db = Database::open_at(&path).unwrap();
    let store = SupplyStore::load(&db).unwrap();

    let supply = store.get_supply(&supply_id).unwrap();
    assert_eq!(supply.quantity, 2);
    assert_eq!(supply.notes.as_deref(), Some("fridge drawer"));

    let item = store.get_in_use(&item_id).unwrap();
    assert_eq!(item.supply_name, "G7 Sensor");
    assert_eq!(item.expires_at, Some(at(240 * 3_600)));
    assert_eq!(item.grace_period_ends_at, Some(at(252 * 3_600)));

    assert_eq!(store.timers().len(), 1);
    assert_eq!(store.timers()[0].duration_days, 3);
}

#[test]
fn derived_state_tracks_store_mutations() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_at(&dir.path().join("diakit.db")).unwrap();
    let mut store = SupplyStore::load(&db).unwrap();

    let supply_id = store
        .add_supply(SupplyDraft {
            name: "Quick-set".to_string(),
            category: SupplyCategory::InfusionSets,
            quantity: 5,
            expiration_date: None,
            notes: None,
            warning_threshold: None,
        })
        .unwrap()
        .id
        .clone();
    let item = store
        .start_using(
            &supply_id,
            ItemDetails::Device {
                duration_hours: 72,
                ended_early: false,
            },
            Some(6),
            at(0),
        )
        .unwrap();

    let expiry = at(72 * 3_600);
    let status = InUseStatus::compute(&item, expiry - Duration::seconds(1));
    assert!(!status.is_expired);
    assert_eq!(status.time_remaining_secs, Some(1));

    let status = InUseStatus::compute(&item, expiry + Duration::seconds(1));
    assert!(status.is_expired);
    assert!(status.is_in_grace_period);

    // Ending the device early freezes the countdown.
    let item = store.end_device_early(&item.id, at(3_600)).unwrap();
    let status = InUseStatus::compute(&item, at(7_200));
    assert_eq!(status.time_remaining_secs, None);
    assert!(!status.is_expired);

    let timer = store
        .add_timer(
            TimerDraft {
                name: "Sensor".to_string(),
                kind: TimerKind::Cgm,
                duration_days: None,
                notes: None,
            },
            at(0),
        )
        .unwrap()
        .clone();
    let status = TimerStatus::compute(&timer, at(9 * 86_400 + 60));
    assert!(status.is_warning);

    let timer = store.reset_timer(&timer.id, at(9 * 86_400 + 120)).unwrap();
    let status = TimerStatus::compute(&timer, at(9 * 86_400 + 180));
    assert_eq!(status.days_remaining, 10);
    assert!(!status.is_warning);
}

#[test]
fn history_mirrors_a_user_session() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_at(&dir.path().join("diakit.db")).unwrap();
    let mut store = SupplyStore::load(&db).unwrap();
    let log = HistoryLog::new(&db);

    let supply = store
        .add_supply(SupplyDraft {
            name: "Humalog".to_string(),
            category: SupplyCategory::Insulin,
            quantity: 4,
            expiration_date: None,
            notes: None,
            warning_threshold: None,
        })
        .unwrap();
    let supply_id = supply.id.clone();
    log.log_supply_added(&supply_id, "Humalog", "insulin", 4)
        .unwrap();

    let item = store
        .start_using(
            &supply_id,
            ItemDetails::Insulin {
                total_volume: 1000.0,
                remaining_volume: 1000.0,
                unit: VolumeUnit::Units,
            },
            None,
            at(0),
        )
        .unwrap();
    log.log_item_started(&item.id, &supply_id, "Humalog", "insulin")
        .unwrap();

    store.record_insulin_use(&item.id, 250.0).unwrap();
    log.log_insulin_use(&item.id, "Humalog", 250.0, 750.0, "units")
        .unwrap();

    let update = store
        .update_supply(
            &supply_id,
            SupplyPatch {
                quantity: Some(10),
                ..SupplyPatch::default()
            },
        )
        .unwrap();
    log.log_quantity_changed(
        &supply_id,
        "Humalog",
        update.before.quantity,
        update.after.quantity,
    )
    .unwrap();

    let events = log.by_supply(&supply_id).unwrap();
    assert_eq!(events.len(), 3); // insulin-use event carries no supply_id
    let kinds: Vec<HistoryEventKind> = log
        .recent(None)
        .unwrap()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds.len(), 4);
    for kind in [
        HistoryEventKind::SupplyAdded,
        HistoryEventKind::ItemStartedUsing,
        HistoryEventKind::InsulinVolumeUpdated,
        HistoryEventKind::SupplyQuantityChanged,
    ] {
        assert!(kinds.contains(&kind), "missing {kind:?}");
    }

    let change = log
        .by_kind(HistoryEventKind::SupplyQuantityChanged)
        .unwrap();
    assert_eq!(
        change[0].metadata.as_ref().unwrap().quantity_change,
        Some(7)
    );
}

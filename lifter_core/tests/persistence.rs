use std::fs;

use lifter_core::mocks::{ManualClock, SpyActuator};
use lifter_core::{
    Calibration, JsonFileStore, Lifter, LifterError, StateRecord, StateStore, UsageInterval,
};

const T: f64 = 10_000.0;

fn lifter_on(path: &std::path::Path, clock: &ManualClock) -> lifter_core::Result<Lifter> {
    Lifter::builder()
        .with_actuator(SpyActuator::new())
        .with_store(JsonFileStore::open(path)?)
        .with_calibration(Calibration::new(23.7, 47.5, 0.54, 0.55))
        .with_clock(Box::new(clock.clone()))
        .build()
}

#[test]
fn saved_record_uses_documented_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut store = JsonFileStore::open(&path).unwrap();
    store
        .save(&StateRecord {
            usage_periods: vec![UsageInterval::new(100.0, 112.5).unwrap()],
            last_position: Some(30.0),
            total_up_time: 12.5,
        })
        .unwrap();

    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(v["usage_periods"][0], serde_json::json!([100.0, 112.5, 12.5]));
    assert_eq!(v["last_position"], serde_json::json!(30.0));
    assert_eq!(v["total_up_time"], serde_json::json!(12.5));
}

#[test]
fn unknown_position_saved_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    JsonFileStore::open(&path)
        .unwrap()
        .save(&StateRecord::default())
        .unwrap();
    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(v["last_position"].is_null());
}

#[test]
fn second_store_on_same_file_is_busy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let first = JsonFileStore::open(&path).unwrap();
    let err = JsonFileStore::open(&path).unwrap_err();
    assert!(matches!(err, LifterError::Busy(_)), "{err:?}");
    drop(first);
    JsonFileStore::open(&path).expect("lock released on drop");
}

#[test]
fn malformed_file_is_a_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, r#"{"usage_periods": [[5.0, 1.0, -4.0]]}"#).unwrap();
    let err = JsonFileStore::open(&path).unwrap().load().unwrap_err();
    match err {
        LifterError::State(msg) => assert!(msg.contains("state.json"), "{msg}"),
        other => panic!("expected State, got {other:?}"),
    }

    fs::write(&path, "not json").unwrap();
    assert!(JsonFileStore::open(&path).unwrap().load().is_err());
}

#[test]
fn legacy_up_time_key_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{"usage_periods": [], "last_position": 25.0, "cumulative_up_time": 7.5}"#,
    )
    .unwrap();
    let rec = JsonFileStore::open(&path).unwrap().load().unwrap();
    assert_eq!(rec.total_up_time, 7.5);
    assert_eq!(rec.last_position, Some(25.0));
}

#[test]
fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = ManualClock::new(T);

    {
        let mut lifter = lifter_on(&path, &clock).unwrap();
        lifter.reset_state(None).unwrap();
        let res = lifter.plan_and_execute_movement(47.5, None);
        assert!(res.success, "{:?}", res.error);
        assert_eq!(res.burst_count(), 2);
    }

    let mut lifter = lifter_on(&path, &clock).unwrap();
    assert_eq!(lifter.state().last_known_position, Some(47.5));
    assert_eq!(lifter.state().ledger.intervals().len(), 2);
    let status = lifter.duty_cycle_status();
    assert!((status.current_usage - 23.8 / 0.54).abs() < 1e-4);
    assert!((lifter.state().cumulative_up_time - 23.8 / 0.54).abs() < 1e-4);
}

#[test]
fn running_lifter_blocks_second_instance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let clock = ManualClock::new(T);
    let _first = lifter_on(&path, &clock).unwrap();
    let err = lifter_on(&path, &clock).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LifterError>(),
        Some(LifterError::Busy(_))
    ));
}

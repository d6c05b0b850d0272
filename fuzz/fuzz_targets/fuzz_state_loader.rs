#![no_main]
use libfuzzer_sys::fuzz_target;
use lifter_core::{DutyCyclePolicy, LifterState, StateRecord};

fuzz_target!(|data: &str| {
    let Ok(rec) = StateRecord::from_json(data) else {
        return;
    };
    // Anything accepted must be usable by the ledger without panicking.
    let mut state = LifterState::from_record(DutyCyclePolicy::default(), rec);
    let now = state
        .ledger
        .intervals()
        .iter()
        .map(|iv| iv.end())
        .fold(0.0_f64, f64::max);
    let status = state.ledger.status(now);
    assert!(status.current_usage >= 0.0);
    let _ = state.ledger.time_until_available(now, 10.0);
    let _ = state.to_record().to_json();
});

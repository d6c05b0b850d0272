#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(mut cfg) = lifter_config::load_toml(data) {
        let _ = cfg.validate();
        // Fitted rates go through the same validation path.
        cfg.apply_rates(lifter_config::RateCalibration {
            up_rate: cfg.calibration.up_rate,
            down_rate: cfg.calibration.down_rate,
        });
        let _ = cfg.validate();
    }
});

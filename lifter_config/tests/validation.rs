use lifter_config::{ReleaseMode, load_toml};
use rstest::rstest;

const BASE: &str = r#"
[pins]
up = 17
down = 27

[calibration]
lowest_height = 23.7
highest_height = 54.5
up_rate = 0.54
down_rate = 0.55
"#;

#[test]
fn minimal_config_gets_defaults() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");

    assert_eq!(cfg.duty_cycle.window_period_s, 1200.0);
    assert_eq!(cfg.duty_cycle.max_on_time_s, 120.0);
    assert_eq!(cfg.duty_cycle.max_continuous_burst_s, 30.0);
    assert_eq!(cfg.movement.tolerance_in, 0.01);
    assert_eq!(cfg.movement.rest_between_bursts_s, 2.0);
    assert!(cfg.relay.active_low);
    assert_eq!(cfg.relay.release, ReleaseMode::HighZ);
    assert_eq!(cfg.state.file, "lifter_state.json");
}

#[test]
fn parses_full_config() {
    let toml = format!(
        "{BASE}\n{}",
        r#"
[relay]
active_low = false
release = "inactive"

[duty_cycle]
window_period_s = 600
max_on_time_s = 60
max_continuous_burst_s = 20

[movement]
tolerance_in = 0.05
rest_between_bursts_s = 1.5
cancel_poll_ms = 20
max_wait_poll_s = 10

[state]
file = "/var/lib/lifter/state.json"

[logging]
file = "/var/log/lifter.log"
level = "debug"
rotation = "daily"
"#
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.relay.release, ReleaseMode::Inactive);
    assert!(!cfg.relay.active_low);
    assert_eq!(cfg.duty_cycle.max_continuous_burst_s, 20.0);
    assert_eq!(cfg.movement.cancel_poll_ms, 20);
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[test]
fn missing_calibration_is_a_parse_error() {
    let toml = r#"
[pins]
up = 17
down = 27
"#;
    assert!(load_toml(toml).is_err());
}

#[rstest]
#[case("[pins]\nup = 17\ndown = 17", "must be different")]
#[case("[calibration]\nlowest_height = 30.0\nhighest_height = 20.0\nup_rate = 0.5\ndown_rate = 0.5", "highest_height must be >")]
#[case("[calibration]\nlowest_height = 20.0\nhighest_height = 30.0\nup_rate = 0.0\ndown_rate = 0.5", "up_rate must be > 0")]
#[case("[calibration]\nlowest_height = 20.0\nhighest_height = 30.0\nup_rate = 0.5\ndown_rate = -1.0", "down_rate must be > 0")]
#[case("[duty_cycle]\nwindow_period_s = 100\nmax_on_time_s = 120", "max_on_time_s must be <=")]
#[case("[duty_cycle]\nmax_on_time_s = 20\nmax_continuous_burst_s = 30", "max_continuous_burst_s must be <=")]
#[case("[duty_cycle]\nwindow_period_s = 0", "window_period_s must be > 0")]
#[case("[movement]\ntolerance_in = 0.0", "tolerance_in must be in")]
#[case("[movement]\ncancel_poll_ms = 0", "cancel_poll_ms must be >= 1")]
#[case("[movement]\nrest_between_bursts_s = -1.0", "rest_between_bursts_s must be >= 0")]
#[case("[state]\nfile = \"  \"", "state.file must not be empty")]
fn rejects_invalid_values(#[case] section: &str, #[case] needle: &str) {
    // Later tables replace earlier ones of the same name, so build the document
    // from BASE minus whichever table the case overrides.
    let overridden = section.lines().next().unwrap_or_default();
    let mut doc = String::new();
    let mut skip = false;
    for line in BASE.lines() {
        if line.starts_with('[') {
            skip = line == overridden;
        }
        if !skip {
            doc.push_str(line);
            doc.push('\n');
        }
    }
    doc.push_str(section);
    doc.push('\n');

    let cfg = load_toml(&doc).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains(needle), "unexpected: {err}");
}

#[test]
fn apply_rates_overrides_toml() {
    let mut cfg = load_toml(BASE).unwrap();
    cfg.apply_rates(lifter_config::RateCalibration {
        up_rate: 0.6,
        down_rate: 0.7,
    });
    assert_eq!(cfg.calibration.up_rate, 0.6);
    assert_eq!(cfg.calibration.down_rate, 0.7);
}

#[test]
fn shipped_sample_config_is_valid() {
    let cfg = load_toml(include_str!("../../etc/lifter_config.toml")).expect("parse sample");
    cfg.validate().expect("sample config should pass");
    assert_eq!(cfg.pins.up, 17);
    assert_eq!(cfg.logging.rotation.as_deref(), Some("never"));
}

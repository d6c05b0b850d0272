use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Fast simulated desk: 10 in/s both ways so real-clock moves finish quickly.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
# pins are unused in sim backend but must be present
up = 17
down = 27

[calibration]
lowest_height = 0.0
highest_height = 10.0
up_rate = 10.0
down_rate = 10.0

[movement]
rest_between_bursts_s = 0.1
cancel_poll_ms = 10
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn lifter(cfg: &Path, state: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lifter").unwrap();
    cmd.arg("--config")
        .arg(cfg)
        .arg("--state")
        .arg(state)
        .arg("--log-level")
        .arg("error");
    cmd
}

fn write_state(path: &Path, position: Option<f64>) {
    let v = serde_json::json!({
        "usage_periods": [],
        "last_position": position,
        "total_up_time": 0.0,
    });
    fs::write(path, v.to_string()).unwrap();
}

#[rstest]
#[case(&["--help"], None, 0, "Usage:", "stdout")]
#[case(&["move", "--target", "1.0"], None, 4, "height is unknown", "stderr")]
#[case(&["move", "--target", "20.0", "--current", "1.0"], None, 3, "outside the calibrated range", "stderr")]
#[case(&["move", "--target", "1.0", "--current", "0.0"], None, 0, "Moved up", "stdout")]
#[case(&["move", "--target", "2.0"], Some(2.0), 0, "nothing to do", "stdout")]
#[case(&["nudge", "--direction", "up", "--seconds", "31"], Some(2.0), 6, "exceeds the continuous limit", "stderr")]
#[case(&["move"], None, 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] position: Option<f64>,
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");
    if position.is_some() {
        write_state(&state, position);
    }

    let mut cmd = lifter(&cfg, &state);
    cmd.args(args);

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn move_is_persisted_and_reported_by_status() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");

    lifter(&cfg, &state)
        .args(["move", "--target", "1.5", "--current", "0.0"])
        .assert()
        .success();

    let out = lifter(&cfg, &state)
        .args(["--json", "status"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["last_position"], 1.5);
    let used = v["duty_cycle"]["current_usage"].as_f64().unwrap();
    assert!((used - 0.15).abs() < 0.05, "usage = {used}");
    assert!((v["cumulative_up_time"].as_f64().unwrap() - used).abs() < 1e-9);

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&state).unwrap()).unwrap();
    assert_eq!(saved["usage_periods"].as_array().unwrap().len(), 1);
}

#[test]
fn json_move_prints_one_result_object() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");
    write_state(&state, Some(3.0));

    let out = lifter(&cfg, &state)
        .args(["--json", "move", "--target", "2.0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 1, "stdout was: {stdout}");
    let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(v["success"], true);
    assert_eq!(v["direction"], "down");
    assert_eq!(v["end_height"], 2.0);
    assert!(v["error"].is_null());
    assert_eq!(v["bursts"][0].as_array().unwrap().len(), 3);
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");

    let out = lifter(&cfg, &state)
        .args(["--json", "move", "--target", "1.0"])
        .assert()
        .code(4)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or_default();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "UnknownPosition");
}

#[test]
fn reset_and_set_position() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");

    lifter(&cfg, &state).arg("reset").assert().success();
    lifter(&cfg, &state)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Position: 0.00in"));

    lifter(&cfg, &state)
        .args(["set-position", "4.25"])
        .assert()
        .success();
    lifter(&cfg, &state)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Position: 4.25in"));

    lifter(&cfg, &state)
        .args(["set-position", "11"])
        .assert()
        .code(3);
}

#[test]
fn locked_state_file_is_busy() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");
    let _held = lifter_core::JsonFileStore::open(&state).unwrap();

    lifter(&cfg, &state)
        .arg("status")
        .assert()
        .code(9)
        .stderr(predicate::str::contains("Another lifter process"));
}

#[test]
fn self_check_ok_in_sim() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");
    lifter(&cfg, &state)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        "[pins]\nup = 17\ndown = 17\n[calibration]\nlowest_height = 0.0\nhighest_height = 10.0\nup_rate = 1.0\ndown_rate = 1.0\n",
    )
    .unwrap();
    lifter(&cfg, &dir.path().join("state.json"))
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"));
}

#[test]
fn rates_csv_overrides_config_rates() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let state = dir.path().join("state.json");
    let csv = dir.path().join("rates.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "direction,seconds,inches").unwrap();
    writeln!(f, "up,0.1,2.0").unwrap();
    writeln!(f, "down,0.1,2.0").unwrap();

    // 20 in/s: 2 inches up takes 0.1 s
    let out = lifter(&cfg, &state)
        .arg("--rates")
        .arg(&csv)
        .args(["--json", "move", "--target", "2.0", "--current", "0.0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["end_height"], 2.0);
    let driven = v["duration"].as_f64().unwrap();
    assert!((driven - 0.1).abs() < 0.05, "driven = {driven}");
}

#[rstest]
fn cli_reports_bad_rates_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    // Write a bad-header CSV
    let bad_csv = dir.path().join("rates.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "dir,secs,value").unwrap();
    writeln!(f, "up,10.0,5.4").unwrap();

    let mut cmd = Command::cargo_bin("lifter").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--rates")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

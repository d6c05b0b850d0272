//! Command execution: config loading, hardware assembly, and output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use lifter_config::Config;
use lifter_core::{
    DutyCycleStatus, JsonFileStore, Lifter, MovementOptions, MovementResult, TestSequenceReport,
};
use lifter_traits::Actuator;
use serde_json::json;

use crate::cli::Commands;

/// Read, parse and validate the TOML config, then apply fitted rates if given.
pub fn load_config(path: &Path, rates: Option<&Path>) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let mut cfg = lifter_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?;
    if let Some(csv) = rates {
        let fitted = lifter_config::load_rate_csv(csv)?;
        tracing::info!(
            up_rate = fitted.up_rate,
            down_rate = fitted.down_rate,
            "rates from calibration CSV"
        );
        cfg.apply_rates(fitted);
    }
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

pub fn state_path(cfg: &Config, over: Option<&Path>) -> PathBuf {
    over.map_or_else(|| PathBuf::from(&cfg.state.file), Path::to_path_buf)
}

/// Relay backend: GPIO on a Pi built with `hardware`, otherwise simulated.
pub fn make_actuator(cfg: &Config) -> eyre::Result<Box<dyn Actuator>> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let release = match cfg.relay.release {
            lifter_config::ReleaseMode::HighZ => lifter_hardware::RelayRelease::HighZ,
            lifter_config::ReleaseMode::Inactive => lifter_hardware::RelayRelease::Inactive,
        };
        let act = lifter_hardware::GpioRelayActuator::new(
            cfg.pins.up,
            cfg.pins.down,
            cfg.relay.active_low,
            release,
        )
        .wrap_err("open relay pins")?;
        Ok(Box::new(act))
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        tracing::info!(
            up = cfg.pins.up,
            down = cfg.pins.down,
            "simulated relays (built without hardware feature)"
        );
        Ok(Box::new(lifter_hardware::SimulatedActuator::new()))
    }
}

pub fn open_lifter(cfg: &Config, state: &Path, stop: Arc<AtomicBool>) -> eyre::Result<Lifter> {
    let store = JsonFileStore::open(state)?;
    Lifter::builder()
        .with_actuator(make_actuator(cfg)?)
        .with_store(store)
        .with_config(cfg)
        .with_stop_flag(stop)
        .build()
}

/// Run one subcommand; the result has already been printed when this returns.
pub fn run(
    cmd: &Commands,
    cfg: &Config,
    state: &Path,
    stop: Arc<AtomicBool>,
    json: bool,
) -> eyre::Result<()> {
    if let Commands::SelfCheck = cmd {
        return self_check(cfg, state, json);
    }

    let mut lifter = open_lifter(cfg, state, stop)?;
    match *cmd {
        Commands::Move {
            target,
            current,
            wait,
            max_wait_s,
        } => {
            let opts = MovementOptions {
                wait_for_budget: wait,
                max_wait_s,
            };
            let res = lifter.move_with(target, current, opts);
            print_movement(&res, json);
            res.into_result().map(drop)
        }
        Commands::Status => {
            let status = lifter.duty_cycle_status();
            let wait = lifter.time_until_available(lifter.policy().max_continuous_burst_s);
            let position = lifter.state().last_known_position;
            let up_time = lifter.state().cumulative_up_time;
            if json {
                println!(
                    "{}",
                    json!({
                        "duty_cycle": status,
                        "last_position": position,
                        "cumulative_up_time": up_time,
                        "full_burst_available_in_s": wait,
                    })
                );
            } else {
                match position {
                    Some(p) => println!("Position: {p:.2}in"),
                    None => println!("Position: unknown"),
                }
                println!("Up time: {up_time:.1}s");
                println!("{}", duty_line(&status));
                if let Some(w) = wait.filter(|w| *w > 0.0) {
                    println!("Full burst available in {w:.0}s");
                }
            }
            Ok(())
        }
        Commands::Nudge { direction, seconds } => {
            let res = lifter.nudge(direction.into(), seconds);
            print_movement(&res, json);
            res.into_result().map(drop)
        }
        Commands::TestSequence { distance, rest_s } => {
            let report = lifter.test_sequence(distance, rest_s)?;
            print_sequence(&report, json)?;
            match report.down {
                Some(down) if report.up.success => down.into_result().map(drop),
                _ => report.up.into_result().map(drop),
            }
        }
        Commands::Reset { position } => {
            lifter.reset_state(position)?;
            report_position(&lifter, "reset", json);
            Ok(())
        }
        Commands::SetPosition { height } => {
            lifter.set_position(height)?;
            report_position(&lifter, "set-position", json);
            Ok(())
        }
        Commands::SelfCheck => Ok(()),
    }
}

fn self_check(cfg: &Config, state: &Path, json: bool) -> eyre::Result<()> {
    let store = JsonFileStore::open(state)?;
    let mut act = make_actuator(cfg)?;
    act.release_all()
        .map_err(|e| lifter_core::hw_error::map_hw_error(e.as_ref()))
        .wrap_err("release relay lines")?;
    drop(store);
    if json {
        println!(
            "{}",
            json!({ "ok": true, "state_file": state.display().to_string() })
        );
    } else {
        println!("OK");
    }
    Ok(())
}

fn duty_line(s: &DutyCycleStatus) -> String {
    format!(
        "Duty cycle: {:.1}s / {:.1}s used ({:.1}%), {:.1}s remaining in {:.0}s window",
        s.current_usage, s.max_usage, s.percentage_used, s.remaining, s.window_period
    )
}

fn fmt_height(h: Option<f64>) -> String {
    h.map_or_else(|| "?".to_string(), |h| format!("{h:.2}"))
}

fn print_movement(res: &MovementResult, json: bool) {
    if json {
        match serde_json::to_string(res) {
            Ok(s) => println!("{s}"),
            Err(e) => tracing::warn!(error = %e, "serialize movement result"),
        }
        return;
    }
    match res.direction {
        None if res.success => println!(
            "Already at {}in, nothing to do",
            fmt_height(res.end_height)
        ),
        None => {}
        Some(dir) => println!(
            "Moved {dir}: {} -> {}in in {:.2}s ({} burst{})",
            fmt_height(res.start_height),
            fmt_height(res.end_height),
            res.duration.unwrap_or(0.0),
            res.burst_count(),
            if res.burst_count() == 1 { "" } else { "s" }
        ),
    }
    println!("{}", duty_line(&res.duty_cycle));
}

fn print_sequence(report: &TestSequenceReport, json: bool) -> eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    println!(
        "Test sequence: up {:.2}in, rest {:.1}s, down",
        report.distance, report.rest_s
    );
    print_movement(&report.up, false);
    if let Some(down) = &report.down {
        print_movement(down, false);
    }
    Ok(())
}

fn report_position(lifter: &Lifter, action: &str, json: bool) {
    let st = lifter.state();
    if json {
        println!(
            "{}",
            json!({
                "action": action,
                "last_position": st.last_known_position,
                "cumulative_up_time": st.cumulative_up_time,
                "usage_periods": st.ledger.intervals().len(),
            })
        );
    } else {
        println!(
            "Position recorded: {}in ({} usage periods kept)",
            fmt_height(st.last_known_position),
            st.ledger.intervals().len()
        );
    }
}

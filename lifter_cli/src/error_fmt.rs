//! Human-readable error descriptions and structured JSON error formatting.

use lifter_core::error::{BuildError, LifterError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingActuator => {
                "What happened: No actuator was provided to the lifter.\nLikely causes: Relay pins failed to initialize or were not wired into the builder.\nHow to fix: Ensure the actuator is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No state store was provided to the lifter.\nLikely causes: The state file could not be opened.\nHow to fix: Check [state] file in the config or pass --state.".to_string()
            }
            BuildError::MissingCalibration => {
                "What happened: Height calibration not set.\nLikely causes: The config was not passed to the builder.\nHow to fix: Provide [calibration] in the config file.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/lifter_config.toml for a sample."
            ),
        };
    }

    if let Some(le) = err.downcast_ref::<LifterError>() {
        return match le {
            LifterError::OutOfRange { target, lowest, highest } => format!(
                "What happened: Height {target:.2}in is outside the calibrated range.\nLikely causes: Typo in --target/--current, or the [calibration] limits are too narrow.\nHow to fix: Use a height between {lowest:.2} and {highest:.2} inches."
            ),
            LifterError::UnknownPosition => {
                "What happened: The current desk height is unknown.\nLikely causes: No state file yet, or the position was never recorded.\nHow to fix: Pass --current, or run `lifter reset` after moving the desk to its lowest point.".to_string()
            }
            LifterError::DutyCycleExceeded { wait_hint_s, remaining_s } => format!(
                "What happened: Motor duty-cycle budget exhausted ({remaining_s:.1}s left in the window).\nLikely causes: Too much movement in the recent window.\nHow to fix: Wait about {wait_hint_s:.0}s and retry, or pass --wait to sleep until the budget frees up."
            ),
            LifterError::BurstTooLong { requested_s, max_s } => format!(
                "What happened: A {requested_s:.1}s burst exceeds the continuous limit of {max_s:.1}s.\nLikely causes: --seconds too large for a nudge.\nHow to fix: Use a shorter burst or move to a target height instead."
            ),
            LifterError::ActuatorFailure(msg) => format!(
                "What happened: Relay control failed ({msg}).\nLikely causes: Wrong [pins], missing GPIO permissions, or wiring faults.\nHow to fix: Check the relay board and pins; both lines were released."
            ),
            LifterError::Cancelled => {
                "What happened: Movement was cancelled.\nLikely causes: Ctrl-C or a stop request.\nHow to fix: Check the desk height; the elapsed motor time was recorded.".to_string()
            }
            LifterError::Busy(msg) => format!(
                "What happened: Another lifter process holds the state file ({msg}).\nLikely causes: A movement is still running elsewhere.\nHow to fix: Wait for it to finish, then rerun."
            ),
            LifterError::State(msg) => format!(
                "What happened: State file problem ({msg}).\nLikely causes: Hand-edited or corrupted JSON, or a read-only directory.\nHow to fix: Fix or remove the file, then run `lifter reset`."
            ),
            // Fallback to generic for other domain errors
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open relay pin") || lower.contains("open gpio") {
        return "What happened: Failed to initialize relay pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("invalid configuration")
        || lower.contains("parse config")
        || (lower.contains("pin") && lower.contains("missing"))
    {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [pins] or [calibration], or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Rate CSV header special-case
    if lower.contains("rate calibration csv must have headers") {
        return "Invalid headers in rate calibration CSV. Expected 'direction,seconds,inches'."
            .to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name of an error kind for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<LifterError>() {
        Some(LifterError::OutOfRange { .. }) => "OutOfRange",
        Some(LifterError::UnknownPosition) => "UnknownPosition",
        Some(LifterError::BurstTooLong { .. }) => "BurstTooLong",
        Some(LifterError::DutyCycleExceeded { .. }) => "DutyCycleExceeded",
        Some(LifterError::InvalidDuration(_)) => "InvalidDuration",
        Some(LifterError::ActuatorFailure(_)) => "ActuatorFailure",
        Some(LifterError::Cancelled) => "Cancelled",
        Some(LifterError::State(_)) => "State",
        Some(LifterError::Busy(_)) => "Busy",
        Some(LifterError::Config(_)) => "InvalidConfig",
        None => "Error",
    }
}

/// Map domain errors to stable exit codes; anything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<LifterError>() {
        Some(LifterError::OutOfRange { .. }) => 3,
        Some(LifterError::UnknownPosition) => 4,
        Some(LifterError::DutyCycleExceeded { .. }) => 5,
        Some(LifterError::BurstTooLong { .. }) => 6,
        Some(LifterError::ActuatorFailure(_)) => 7,
        Some(LifterError::Cancelled) => 8,
        Some(LifterError::Busy(_)) => 9,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let reason = reason_name(err);
    let details = match err.downcast_ref::<LifterError>() {
        Some(LifterError::DutyCycleExceeded { wait_hint_s, remaining_s }) => {
            Some(json!({ "wait_hint_s": wait_hint_s, "remaining_s": remaining_s }))
        }
        Some(LifterError::BurstTooLong { requested_s, max_s }) => {
            Some(json!({ "requested_s": requested_s, "max_s": max_s }))
        }
        Some(LifterError::OutOfRange { target, lowest, highest }) => {
            Some(json!({ "target": target, "lowest": lowest, "highest": highest }))
        }
        _ => None,
    };

    let obj = if let Some(d) = details {
        json!({ "reason": reason, "details": d, "message": msg })
    } else {
        json!({ "reason": reason, "message": msg })
    };
    obj.to_string()
}

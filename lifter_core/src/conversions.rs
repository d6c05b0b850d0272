//! `From` implementations bridging `lifter_config` types to `lifter_core` types.

use crate::config::{Calibration, DutyCyclePolicy, MovementCfg};

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&lifter_config::CalibrationCfg> for Calibration {
    fn from(c: &lifter_config::CalibrationCfg) -> Self {
        Self {
            lowest_height: c.lowest_height,
            highest_height: c.highest_height,
            up_rate: c.up_rate,
            down_rate: c.down_rate,
        }
    }
}

// ── DutyCyclePolicy ──────────────────────────────────────────────────────────

impl From<&lifter_config::DutyCycleCfg> for DutyCyclePolicy {
    fn from(c: &lifter_config::DutyCycleCfg) -> Self {
        Self {
            window_period_s: c.window_period_s,
            max_on_time_s: c.max_on_time_s,
            max_continuous_burst_s: c.max_continuous_burst_s,
        }
    }
}

// ── MovementCfg ──────────────────────────────────────────────────────────────

impl From<&lifter_config::MovementCfg> for MovementCfg {
    fn from(c: &lifter_config::MovementCfg) -> Self {
        Self {
            tolerance_in: c.tolerance_in,
            rest_between_bursts_s: c.rest_between_bursts_s,
            cancel_poll_ms: c.cancel_poll_ms,
            max_wait_poll_s: c.max_wait_poll_s,
        }
    }
}

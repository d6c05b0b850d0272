//! Runtime configuration types for the lifter engine.
//!
//! These are separate from the TOML-deserialized config in `lifter_config`.

use crate::planner::Direction;

/// Calibrated travel range and speeds of one installation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Lowest reachable height (inches).
    pub lowest_height: f64,
    /// Highest reachable height (inches).
    pub highest_height: f64,
    /// Inches per second while moving up.
    pub up_rate: f64,
    /// Inches per second while moving down.
    pub down_rate: f64,
}

impl Calibration {
    pub fn new(lowest_height: f64, highest_height: f64, up_rate: f64, down_rate: f64) -> Self {
        Self {
            lowest_height,
            highest_height,
            up_rate,
            down_rate,
        }
    }

    pub fn rate(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Up => self.up_rate,
            Direction::Down => self.down_rate,
        }
    }

    pub fn contains(&self, height: f64) -> bool {
        (self.lowest_height..=self.highest_height).contains(&height)
    }

    pub fn clamp(&self, height: f64) -> f64 {
        height.clamp(self.lowest_height, self.highest_height)
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !(self.lowest_height.is_finite() && self.highest_height.is_finite()) {
            return Err("calibration heights must be finite");
        }
        if self.highest_height <= self.lowest_height {
            return Err("highest_height must be > lowest_height");
        }
        if !(self.up_rate.is_finite() && self.up_rate > 0.0) {
            return Err("up_rate must be > 0");
        }
        if !(self.down_rate.is_finite() && self.down_rate > 0.0) {
            return Err("down_rate must be > 0");
        }
        Ok(())
    }
}

/// Sliding-window duty-cycle limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCyclePolicy {
    /// Length of the trailing window in seconds. Default: 1200 s.
    pub window_period_s: f64,
    /// Maximum on-time inside any window. Default: 120 s (10%).
    pub max_on_time_s: f64,
    /// Hard ceiling for one continuous burst. Default: 30 s.
    pub max_continuous_burst_s: f64,
}

impl Default for DutyCyclePolicy {
    fn default() -> Self {
        Self {
            window_period_s: 1200.0,
            max_on_time_s: 120.0,
            max_continuous_burst_s: 30.0,
        }
    }
}

impl DutyCyclePolicy {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.window_period_s) {
            return Err("window_period_s must be > 0");
        }
        if !positive(self.max_on_time_s) || self.max_on_time_s > self.window_period_s {
            return Err("max_on_time_s must be in (0, window_period_s]");
        }
        if !positive(self.max_continuous_burst_s)
            || self.max_continuous_burst_s > self.max_on_time_s
        {
            return Err("max_continuous_burst_s must be in (0, max_on_time_s]");
        }
        Ok(())
    }
}

/// Movement execution knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementCfg {
    /// Deltas below this are a no-op. Default: 0.01 in.
    pub tolerance_in: f64,
    /// Rest between consecutive bursts. Default: 2 s.
    pub rest_between_bursts_s: f64,
    /// Cancellation poll period while a burst or rest is running. Default: 50 ms.
    pub cancel_poll_ms: u64,
    /// Longest single sleep while waiting for budget. Default: 30 s.
    pub max_wait_poll_s: f64,
}

impl Default for MovementCfg {
    fn default() -> Self {
        Self {
            tolerance_in: 0.01,
            rest_between_bursts_s: 2.0,
            cancel_poll_ms: 50,
            max_wait_poll_s: 30.0,
        }
    }
}

impl MovementCfg {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !(self.tolerance_in.is_finite() && self.tolerance_in > 0.0) {
            return Err("tolerance_in must be > 0");
        }
        if !(self.rest_between_bursts_s.is_finite() && self.rest_between_bursts_s >= 0.0) {
            return Err("rest_between_bursts_s must be >= 0");
        }
        if self.cancel_poll_ms == 0 {
            return Err("cancel_poll_ms must be >= 1");
        }
        if !(self.max_wait_poll_s.is_finite() && self.max_wait_poll_s > 0.0) {
            return Err("max_wait_poll_s must be > 0");
        }
        Ok(())
    }
}

/// Per-request behavior when the duty cycle has no room.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementOptions {
    /// Sleep until the ledger admits each burst instead of aborting.
    pub wait_for_budget: bool,
    /// Give up waiting after this many seconds in total (None = no limit).
    pub max_wait_s: Option<f64>,
}

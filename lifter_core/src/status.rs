//! Reports handed back to callers after a movement.

use serde::Serialize;

use crate::error::{LifterError, Result};
use crate::ledger::{DutyCycleStatus, UsageInterval};
use crate::planner::Direction;

/// Outcome of one movement request.
///
/// Failures after some bursts ran keep `end_height`, `duration` and `bursts`
/// describing what actually happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementResult {
    pub success: bool,
    pub direction: Option<Direction>,
    pub start_height: Option<f64>,
    pub end_height: Option<f64>,
    /// Planned travel, inches.
    pub distance: Option<f64>,
    /// Measured motor-on time, seconds.
    pub duration: Option<f64>,
    /// Recorded intervals as `[start, end, duration]`.
    pub bursts: Vec<UsageInterval>,
    pub duty_cycle: DutyCycleStatus,
    pub cumulative_up_time: f64,
    #[serde(serialize_with = "error_as_string")]
    pub error: Option<LifterError>,
}

fn error_as_string<S: serde::Serializer>(
    e: &Option<LifterError>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match e {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

impl MovementResult {
    /// A request refused before anything moved.
    pub(crate) fn rejected(
        error: LifterError,
        duty_cycle: DutyCycleStatus,
        cumulative_up_time: f64,
        start_height: Option<f64>,
    ) -> Self {
        Self {
            success: false,
            direction: None,
            start_height,
            end_height: start_height,
            distance: None,
            duration: None,
            bursts: Vec::new(),
            duty_cycle,
            cumulative_up_time,
            error: Some(error),
        }
    }

    /// Number of bursts that physically ran.
    pub fn burst_count(&self) -> usize {
        self.bursts.len()
    }

    /// Turn a failed result into its error, for `?`-style callers.
    pub fn into_result(self) -> Result<Self> {
        match self.error.clone() {
            Some(e) => Err(eyre::Report::new(e)),
            None => Ok(self),
        }
    }
}

/// Up-then-down exercise run from the lowest height.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSequenceReport {
    pub distance: f64,
    pub rest_s: f64,
    pub up: MovementResult,
    /// Missing when the upward leg failed.
    pub down: Option<MovementResult>,
}

impl TestSequenceReport {
    pub fn success(&self) -> bool {
        self.up.success && self.down.as_ref().is_some_and(|d| d.success)
    }
}

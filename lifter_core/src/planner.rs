//! Turning a height request into a sequence of timed bursts.

use serde::Serialize;

use crate::config::{Calibration, DutyCyclePolicy, MovementCfg};
use crate::error::LifterError;
use crate::util::TIME_EPS_S;
use lifter_traits::Line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Relay line that moves the column this way.
    pub fn line(self) -> Line {
        match self {
            Direction::Up => Line::Up,
            Direction::Down => Line::Down,
        }
    }

    /// +1 for up, -1 for down.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Direction {
    type Err = LifterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(LifterError::Config(format!(
                "unknown direction '{other}' (expected up|down)"
            ))),
        }
    }
}

/// A validated movement ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementPlan {
    pub start_height: f64,
    pub target_height: f64,
    pub direction: Direction,
    /// Absolute travel in inches.
    pub distance: f64,
    /// Inches per second for `direction`.
    pub rate: f64,
    /// Total on-time needed, seconds.
    pub required_s: f64,
    /// Burst lengths; rests go between consecutive entries.
    pub chunks: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Already within tolerance of the target.
    NoOp { height: f64 },
    Move(MovementPlan),
}

fn check_range(cal: &Calibration, height: f64) -> Result<(), LifterError> {
    if height.is_finite() && cal.contains(height) {
        Ok(())
    } else {
        Err(LifterError::OutOfRange {
            target: height,
            lowest: cal.lowest_height,
            highest: cal.highest_height,
        })
    }
}

/// Validate a request and work out direction, duration and chunking.
///
/// `current` wins over `last_known`; with neither the position is unknown.
/// Nothing here touches the ledger or the actuator.
pub fn plan_movement(
    cal: &Calibration,
    policy: &DutyCyclePolicy,
    movement: &MovementCfg,
    target: f64,
    current: Option<f64>,
    last_known: Option<f64>,
) -> Result<Plan, LifterError> {
    check_range(cal, target)?;
    let start = current.or(last_known).ok_or(LifterError::UnknownPosition)?;
    check_range(cal, start)?;

    let delta = target - start;
    if delta.abs() < movement.tolerance_in {
        return Ok(Plan::NoOp { height: start });
    }

    let direction = if delta > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };
    let rate = cal.rate(direction);
    let distance = delta.abs();
    let required_s = distance / rate;
    let chunks = chunk_duration(required_s, policy.max_continuous_burst_s);

    Ok(Plan::Move(MovementPlan {
        start_height: start,
        target_height: target,
        direction,
        distance,
        rate,
        required_s,
        chunks,
    }))
}

/// Split `total_s` into bursts no longer than `max_burst_s`.
///
/// Every chunk but the last equals `max_burst_s`; the chunks sum to `total_s`.
/// Float residue below a microsecond does not produce an extra chunk.
pub fn chunk_duration(total_s: f64, max_burst_s: f64) -> Vec<f64> {
    let mut chunks = Vec::new();
    if !(total_s.is_finite() && max_burst_s.is_finite() && max_burst_s > 0.0) {
        return chunks;
    }
    let mut remaining = total_s;
    while remaining > TIME_EPS_S {
        let chunk = remaining.min(max_burst_s);
        chunks.push(chunk);
        remaining -= chunk;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cal() -> Calibration {
        Calibration::new(23.7, 47.5, 0.54, 0.55)
    }

    fn plan(target: f64, current: Option<f64>, last: Option<f64>) -> Result<Plan, LifterError> {
        plan_movement(
            &cal(),
            &DutyCyclePolicy::default(),
            &MovementCfg::default(),
            target,
            current,
            last,
        )
    }

    #[rstest]
    #[case(70.0, vec![30.0, 30.0, 10.0])]
    #[case(30.0, vec![30.0])]
    #[case(11.5, vec![11.5])]
    #[case(60.0, vec![30.0, 30.0])]
    #[case(0.0, vec![])]
    fn chunks(#[case] total: f64, #[case] expected: Vec<f64>) {
        assert_eq!(chunk_duration(total, 30.0), expected);
    }

    #[test]
    fn chunking_ignores_float_residue() {
        let total = 30.0 + 1e-9;
        assert_eq!(chunk_duration(total, 30.0).len(), 1);
    }

    #[test]
    fn scenario_d_single_burst_up() {
        let Plan::Move(p) = plan(30.0, Some(23.7), None).unwrap() else {
            panic!("expected a movement");
        };
        assert_eq!(p.direction, Direction::Up);
        assert!((p.distance - 6.3).abs() < 1e-9);
        assert!((p.required_s - 6.3 / 0.54).abs() < 1e-9);
        assert_eq!(p.chunks.len(), 1);
        assert!((p.chunks[0] - 11.6667).abs() < 1e-3);
    }

    #[test]
    fn down_uses_down_rate() {
        let Plan::Move(p) = plan(25.0, Some(36.0), None).unwrap() else {
            panic!("expected a movement");
        };
        assert_eq!(p.direction, Direction::Down);
        assert!((p.required_s - 11.0 / 0.55).abs() < 1e-9);
    }

    #[test]
    fn within_tolerance_is_noop() {
        assert_eq!(
            plan(30.005, Some(30.0), None).unwrap(),
            Plan::NoOp { height: 30.0 }
        );
    }

    #[test]
    fn explicit_current_beats_last_known() {
        let Plan::Move(p) = plan(30.0, Some(25.0), Some(40.0)).unwrap() else {
            panic!("expected a movement");
        };
        assert_eq!(p.start_height, 25.0);
        assert_eq!(p.direction, Direction::Up);
    }

    #[rstest]
    #[case(20.0)]
    #[case(50.0)]
    #[case(f64::NAN)]
    fn target_out_of_range(#[case] target: f64) {
        let err = plan(target, Some(30.0), None).unwrap_err();
        assert!(matches!(err, LifterError::OutOfRange { .. }));
    }

    #[test]
    fn unknown_position() {
        assert_eq!(plan(30.0, None, None).unwrap_err(), LifterError::UnknownPosition);
    }

    #[test]
    fn direction_parses() {
        assert_eq!("UP".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!(" down ".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
    }
}

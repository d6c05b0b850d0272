use thiserror::Error;

/// Everything that can stop a movement or a duty-cycle query.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LifterError {
    #[error("height {target:.2}in is out of range [{lowest:.2}, {highest:.2}]")]
    OutOfRange {
        target: f64,
        lowest: f64,
        highest: f64,
    },
    #[error("no current height provided and no last known position")]
    UnknownPosition,
    #[error("burst of {requested_s:.1}s exceeds maximum continuous runtime of {max_s:.1}s")]
    BurstTooLong { requested_s: f64, max_s: f64 },
    #[error(
        "duty cycle exceeded: {remaining_s:.1}s of budget left, need {wait_hint_s:.1}s more"
    )]
    DutyCycleExceeded { wait_hint_s: f64, remaining_s: f64 },
    #[error("invalid movement duration: {0}s")]
    InvalidDuration(f64),
    #[error("actuator failure: {0}")]
    ActuatorFailure(String),
    #[error("movement cancelled")]
    Cancelled,
    #[error("state error: {0}")]
    State(String),
    #[error("lifter busy: {0}")]
    Busy(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LifterError {
    /// Whether waiting (and nothing else) can make the same request succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LifterError::DutyCycleExceeded { .. })
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing actuator")]
    MissingActuator,
    #[error("missing state store")]
    MissingStore,
    #[error("missing calibration")]
    MissingCalibration,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

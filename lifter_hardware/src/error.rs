use lifter_traits::Line;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("refusing to drive {requested} while {active} is driven")]
    Interlock { requested: Line, active: Line },
}

pub type Result<T> = std::result::Result<T, HwError>;

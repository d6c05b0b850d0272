//! Maps `Box<dyn Error>` from trait boundaries to typed `LifterError`.
//!
//! The traits in `lifter_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `lifter_hardware::HwError` downcasting.

use crate::error::LifterError;

/// Map a trait-boundary error to a typed `LifterError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> LifterError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<lifter_hardware::error::HwError>() {
            return match hw {
                lifter_hardware::error::HwError::Interlock { .. } => {
                    LifterError::ActuatorFailure(format!("relay interlock: {hw}"))
                }
                other => LifterError::ActuatorFailure(other.to_string()),
            };
        }
    }

    LifterError::ActuatorFailure(e.to_string())
}

/// Convenience for `Result`s coming straight out of an `Actuator` call.
pub(crate) fn from_boxed(e: Box<dyn std::error::Error + Send + Sync>) -> LifterError {
    map_hw_error(e.as_ref())
}

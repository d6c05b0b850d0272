//! Common time helpers for lifter_core.

use std::time::Duration;

/// Remainders shorter than this are treated as done (seconds).
///
/// Keeps burst and rest loops from spinning on sub-microsecond float residue.
pub const TIME_EPS_S: f64 = 1e-6;

/// Convert seconds to a `Duration`, mapping negative/NaN to zero and
/// saturating on overflow.
#[inline]
pub fn secs_to_duration(secs: f64) -> Duration {
    if !(secs > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Poll period in seconds for a cancellation check interval in ms (at least 1 ms).
#[inline]
pub fn poll_secs(poll_ms: u64) -> f64 {
    poll_ms.max(1) as f64 / 1_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_to_duration_edges() {
        assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(secs_to_duration(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn poll_secs_floor() {
        assert_eq!(poll_secs(0), 0.001);
        assert_eq!(poll_secs(50), 0.05);
    }
}

//! Executing one timed burst on a relay line.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use lifter_traits::{Actuator, Clock, Line};

use crate::error::LifterError;
use crate::hw_error::from_boxed;
use crate::util::{TIME_EPS_S, secs_to_duration};

/// Releases both lines when dropped, whatever path left the scope.
pub(crate) struct ReleaseGuard<'a> {
    actuator: &'a mut dyn Actuator,
}

impl<'a> ReleaseGuard<'a> {
    pub(crate) fn new(actuator: &'a mut dyn Actuator) -> Self {
        Self { actuator }
    }
}

impl<'a> Deref for ReleaseGuard<'a> {
    type Target = dyn Actuator + 'a;
    fn deref(&self) -> &Self::Target {
        &*self.actuator
    }
}

impl<'a> DerefMut for ReleaseGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.actuator
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.actuator.release_all() {
            tracing::warn!(error = %e, "release_all failed on exit");
        }
    }
}

/// What physically happened during one burst.
#[derive(Debug)]
pub(crate) struct BurstRun {
    pub start: f64,
    pub end: f64,
    pub error: Option<LifterError>,
}

/// Sleep `secs` in slices of at most `poll_s`, watching `stop`.
/// Returns `false` if the flag was raised before the time was up.
pub(crate) fn sleep_interruptible(clock: &dyn Clock, stop: &AtomicBool, secs: f64, poll_s: f64) -> bool {
    let start = clock.now();
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let left = secs - clock.secs_since(start);
        if left <= TIME_EPS_S {
            return true;
        }
        clock.sleep(secs_to_duration(left.min(poll_s)));
    }
}

/// Release both lines, drive `line` for `duration_s`, release it.
///
/// The returned interval is the measured one: a drive failure or a raised stop
/// flag ends the burst early and `end` reflects the time actually spent.
pub(crate) fn run_burst(
    actuator: &mut dyn Actuator,
    clock: &dyn Clock,
    stop: &AtomicBool,
    line: Line,
    duration_s: f64,
    poll_s: f64,
) -> BurstRun {
    if let Err(e) = actuator.release_all() {
        let start = clock.now();
        return BurstRun {
            start,
            end: start,
            error: Some(from_boxed(e)),
        };
    }

    let start = clock.now();
    if let Err(e) = actuator.drive(line) {
        let end = start + clock.secs_since(start);
        if let Err(re) = actuator.release_all() {
            tracing::warn!(error = %re, "release_all failed after drive error");
        }
        return BurstRun {
            start,
            end,
            error: Some(from_boxed(e)),
        };
    }
    tracing::debug!(%line, duration_s, "burst started");

    let completed = sleep_interruptible(clock, stop, duration_s, poll_s);
    let released = actuator.release(line);
    let end = start + clock.secs_since(start);

    let error = match released {
        Err(e) => Some(from_boxed(e)),
        Ok(()) if !completed => Some(LifterError::Cancelled),
        Ok(()) => None,
    };
    tracing::debug!(%line, elapsed_s = end - start, ok = error.is_none(), "burst finished");
    BurstRun { start, end, error }
}

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock abstraction used for duty-cycle bookkeeping.
///
/// - now(): seconds since the Unix epoch (persisted in the usage ledger)
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - secs_since(): elapsed seconds from an earlier `now()` reading
pub trait Clock {
    fn now(&self) -> f64;
    fn sleep(&self, d: Duration);

    /// Seconds elapsed since `epoch`, saturating at 0 if the clock stepped back.
    fn secs_since(&self, epoch: f64) -> f64 {
        (self.now() - epoch).max(0.0)
    }
}

/// Real-time clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
    fn sleep(&self, d: Duration) {
        (**self).sleep(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock::new().now() > 1_577_836_800.0);
    }

    #[test]
    fn secs_since_saturates() {
        let c = SystemClock::new();
        let future = c.now() + 1_000.0;
        assert_eq!(c.secs_since(future), 0.0);
    }
}

//! Test and helper mocks for lifter_core.
//!
//! All mocks are cheap `Clone` handles over shared state so a test can keep
//! one copy for inspection after handing another to the `Lifter`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lifter_traits::{Actuator, Clock, Line};

use crate::error::LifterError;
use crate::state::StateRecord;
use crate::store::StateStore;
use crate::util::secs_to_duration;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ClockInner {
    offset: Duration,
    alarms: Vec<(f64, Arc<AtomicBool>)>,
    panic_at: Option<f64>,
}

/// Deterministic clock: time only moves when something sleeps or the test
/// advances it. Offsets are kept as a `Duration` so repeated sleeps do not
/// accumulate float error.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: f64,
    inner: Arc<Mutex<ClockInner>>,
}

impl ManualClock {
    pub fn new(origin: f64) -> Self {
        Self {
            origin,
            inner: Arc::new(Mutex::new(ClockInner::default())),
        }
    }

    pub fn advance(&self, secs: f64) {
        self.sleep(secs_to_duration(secs));
    }

    /// Raise `flag` once the clock reaches `at`.
    pub fn raise_at(&self, at: f64, flag: Arc<AtomicBool>) {
        lock(&self.inner).alarms.push((at, flag));
    }

    /// Panic from inside `sleep` once the clock reaches `at`.
    pub fn panic_at(&self, at: f64) {
        lock(&self.inner).panic_at = Some(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.origin + lock(&self.inner).offset.as_secs_f64()
    }

    fn sleep(&self, d: Duration) {
        let should_panic = {
            let mut inner = lock(&self.inner);
            inner.offset = inner.offset.saturating_add(d);
            let now = self.origin + inner.offset.as_secs_f64();
            inner.alarms.retain(|(at, flag)| {
                if now >= *at {
                    flag.store(true, Ordering::Relaxed);
                    false
                } else {
                    true
                }
            });
            let fire = matches!(inner.panic_at, Some(at) if now >= at);
            if fire {
                inner.panic_at = None;
            }
            fire
        };
        if should_panic {
            panic!("ManualClock: scheduled panic");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorEvent {
    Drive(Line),
    Release(Line),
}

#[derive(Debug, Default)]
struct SpyInner {
    log: Vec<(f64, ActuatorEvent)>,
    driven: Option<Line>,
    drives: u32,
    fail_drive_on: Option<u32>,
    overlaps: u32,
}

/// Actuator that records every call and can fail on demand.
#[derive(Debug, Clone, Default)]
pub struct SpyActuator {
    inner: Arc<Mutex<SpyInner>>,
    clock: Option<ManualClock>,
}

impl SpyActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp events with `clock`.
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Make the `n`-th call to `drive` (1-based) fail.
    pub fn fail_drive_on(&self, n: u32) {
        lock(&self.inner).fail_drive_on = Some(n);
    }

    pub fn events(&self) -> Vec<ActuatorEvent> {
        lock(&self.inner).log.iter().map(|(_, e)| *e).collect()
    }

    /// Events with the clock reading at which they happened (0.0 without a clock).
    pub fn timeline(&self) -> Vec<(f64, ActuatorEvent)> {
        lock(&self.inner).log.clone()
    }

    pub fn driven(&self) -> Option<Line> {
        lock(&self.inner).driven
    }

    pub fn drive_count(&self) -> u32 {
        lock(&self.inner).drives
    }

    /// Times a drive was attempted while the other line was still active.
    pub fn overlap_count(&self) -> u32 {
        lock(&self.inner).overlaps
    }

    fn stamp(&self) -> f64 {
        self.clock.as_ref().map_or(0.0, |c| c.now())
    }
}

impl Actuator for SpyActuator {
    fn drive(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let t = self.stamp();
        let mut inner = lock(&self.inner);
        inner.drives += 1;
        if inner.fail_drive_on == Some(inner.drives) {
            return Err(Box::new(std::io::Error::other(format!(
                "injected drive failure on {line}"
            ))));
        }
        if let Some(active) = inner.driven
            && active != line
        {
            inner.overlaps += 1;
            return Err(Box::new(std::io::Error::other(format!(
                "{line} driven while {active} active"
            ))));
        }
        inner.driven = Some(line);
        inner.log.push((t, ActuatorEvent::Drive(line)));
        Ok(())
    }

    fn release(&mut self, line: Line) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let t = self.stamp();
        let mut inner = lock(&self.inner);
        if inner.driven == Some(line) {
            inner.driven = None;
        }
        inner.log.push((t, ActuatorEvent::Release(line)));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemInner {
    record: Option<StateRecord>,
    saves: usize,
    fail_saves: bool,
}

/// In-memory `StateStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: StateRecord) -> Self {
        let s = Self::default();
        lock(&s.inner).record = Some(record);
        s
    }

    /// Last saved (or seeded) record.
    pub fn record(&self) -> Option<StateRecord> {
        lock(&self.inner).record.clone()
    }

    /// Replace the stored record, as another process would.
    pub fn put(&self, record: StateRecord) {
        lock(&self.inner).record = Some(record);
    }

    pub fn save_count(&self) -> usize {
        lock(&self.inner).saves
    }

    pub fn fail_saves(&self, fail: bool) {
        lock(&self.inner).fail_saves = fail;
    }
}

impl StateStore for MemoryStore {
    fn load(&mut self) -> Result<StateRecord, LifterError> {
        Ok(lock(&self.inner).record.clone().unwrap_or_default())
    }

    fn save(&mut self, record: &StateRecord) -> Result<(), LifterError> {
        let mut inner = lock(&self.inner);
        if inner.fail_saves {
            return Err(LifterError::State("injected save failure".into()));
        }
        inner.record = Some(record.clone());
        inner.saves += 1;
        Ok(())
    }
}

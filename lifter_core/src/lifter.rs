//! The `Lifter` facade and its type-state builder.
//!
//! The builder enforces at compile time that an actuator, a state store and a
//! calibration are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lifter_traits::{Actuator, Clock, SystemClock};

use crate::burst::{ReleaseGuard, run_burst, sleep_interruptible};
use crate::config::{Calibration, DutyCyclePolicy, MovementCfg, MovementOptions};
use crate::error::{BuildError, LifterError, Result};
use crate::ledger::{Authorization, DutyCycleLedger, DutyCycleStatus, Rejection, UsageInterval};
use crate::planner::{Direction, Plan, plan_movement};
use crate::state::LifterState;
use crate::status::{MovementResult, TestSequenceReport};
use crate::store::StateStore;
use crate::util::poll_secs;

/// Shortest sleep while waiting for duty-cycle budget (s).
const MIN_WAIT_SLEEP_S: f64 = 0.05;

/// Owns the actuator, the clock, the store and the state. `&mut self` on every
/// movement keeps at most one in flight per process.
pub struct Lifter {
    actuator: Box<dyn Actuator>,
    store: Box<dyn StateStore>,
    clock: Arc<dyn Clock + Send + Sync>,
    calibration: Calibration,
    policy: DutyCyclePolicy,
    movement: MovementCfg,
    state: LifterState,
    stop: Arc<AtomicBool>,
    /// In-memory state holds bursts the store has not accepted yet.
    unsaved: bool,
}

impl core::fmt::Debug for Lifter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Lifter")
            .field("calibration", &self.calibration)
            .field("policy", &self.policy)
            .field("position", &self.state.last_known_position)
            .field("intervals", &self.state.ledger.intervals().len())
            .field("cumulative_up_time", &self.state.cumulative_up_time)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Execution {
    bursts: Vec<UsageInterval>,
    driven_s: f64,
    error: Option<LifterError>,
}

impl Lifter {
    /// Start building a Lifter.
    pub fn builder() -> LifterBuilder<Missing, Missing, Missing> {
        LifterBuilder::default()
    }

    pub fn state(&self) -> &LifterState {
        &self.state
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn policy(&self) -> &DutyCyclePolicy {
        &self.policy
    }

    pub fn movement_cfg(&self) -> &MovementCfg {
        &self.movement
    }

    /// Flag that cancels the running burst, rest or budget wait when raised.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Lower the stop flag so later movements can run.
    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }

    /// Re-read persisted state. Unsaved bursts are written out first; if that
    /// still fails the in-memory copy is kept and the error returned.
    pub fn reload(&mut self) -> Result<()> {
        self.load_state().map_err(eyre::Report::new)
    }

    fn load_state(&mut self) -> core::result::Result<(), LifterError> {
        if self.unsaved {
            self.persist()?;
            tracing::info!("unsaved usage history written");
        }
        let record = self.store.load()?;
        let mut state = LifterState::from_record(self.policy, record);
        if let Some(p) = state.last_known_position
            && !self.calibration.contains(p)
        {
            let clamped = self.calibration.clamp(p);
            tracing::warn!(stored = p, clamped, "stored position outside calibrated range");
            state.last_known_position = Some(clamped);
        }
        self.state = state;
        Ok(())
    }

    fn persist(&mut self) -> core::result::Result<(), LifterError> {
        let saved = self.store.save(&self.state.to_record());
        self.unsaved = saved.is_err();
        saved
    }

    /// Duty-cycle snapshot at `now` (epoch seconds).
    pub fn query_duty_cycle_status(&mut self, now: f64) -> DutyCycleStatus {
        self.state.ledger.status(now)
    }

    /// Duty-cycle snapshot at the current clock reading.
    pub fn duty_cycle_status(&mut self) -> DutyCycleStatus {
        let now = self.clock.now();
        self.query_duty_cycle_status(now)
    }

    /// Seconds until a burst of `requested_s` would be admitted; `None` if never.
    pub fn time_until_available(&mut self, requested_s: f64) -> Option<f64> {
        let now = self.clock.now();
        self.state.ledger.time_until_available(now, requested_s)
    }

    /// Move to `target`, aborting on the first rejected burst.
    pub fn plan_and_execute_movement(&mut self, target: f64, current: Option<f64>) -> MovementResult {
        self.move_with(target, current, MovementOptions::default())
    }

    /// Move to `target` with explicit per-request options.
    pub fn move_with(
        &mut self,
        target: f64,
        current: Option<f64>,
        opts: MovementOptions,
    ) -> MovementResult {
        if let Err(e) = self.load_state() {
            return self.rejected(e, current);
        }
        let planned = plan_movement(
            &self.calibration,
            &self.policy,
            &self.movement,
            target,
            current,
            self.state.last_known_position,
        );
        let plan = match planned {
            Ok(Plan::Move(p)) => p,
            Ok(Plan::NoOp { height }) => {
                tracing::info!(height, target, "already at target");
                return MovementResult {
                    success: true,
                    direction: None,
                    start_height: Some(height),
                    end_height: Some(height),
                    distance: Some(0.0),
                    duration: Some(0.0),
                    bursts: Vec::new(),
                    duty_cycle: self.duty_cycle_status(),
                    cumulative_up_time: self.state.cumulative_up_time,
                    error: None,
                };
            }
            Err(e) => {
                let start = current.or(self.state.last_known_position);
                return self.rejected(e, start);
            }
        };

        tracing::info!(
            start = plan.start_height,
            target = plan.target_height,
            direction = %plan.direction,
            distance = plan.distance,
            required_s = plan.required_s,
            bursts = plan.chunks.len(),
            "movement start"
        );
        self.state.last_known_position = Some(plan.start_height);
        let mut exec = self.execute(plan.direction, &plan.chunks, opts);
        if exec.error.is_none() {
            self.state.last_known_position = Some(plan.target_height);
        }
        if let Err(e) = self.persist()
            && exec.error.is_none()
        {
            exec.error = Some(e);
        }
        self.finish(plan.direction, Some(plan.start_height), Some(plan.distance), exec)
    }

    /// One short burst in `direction`, outside any height plan.
    ///
    /// A known position is moved by the estimated travel, clamped to the
    /// calibrated range; an unknown one stays unknown.
    pub fn nudge(&mut self, direction: Direction, seconds: f64) -> MovementResult {
        if let Err(e) = self.load_state() {
            return self.rejected(e, None);
        }
        let start = self.state.last_known_position;
        if !(seconds.is_finite() && seconds > 0.0) {
            return self.rejected(LifterError::InvalidDuration(seconds), start);
        }
        if seconds > self.policy.max_continuous_burst_s {
            let e = LifterError::BurstTooLong {
                requested_s: seconds,
                max_s: self.policy.max_continuous_burst_s,
            };
            return self.rejected(e, start);
        }

        tracing::info!(%direction, seconds, ?start, "nudge");
        let mut exec = self.execute(direction, &[seconds], MovementOptions::default());
        if let Err(e) = self.persist()
            && exec.error.is_none()
        {
            exec.error = Some(e);
        }
        let distance = seconds * self.calibration.rate(direction);
        self.finish(direction, start, Some(distance), exec)
    }

    /// Exercise run: from the lowest height go up `distance`, rest `rest_s`,
    /// come back down.
    pub fn test_sequence(&mut self, distance: f64, rest_s: f64) -> Result<TestSequenceReport> {
        if !(distance.is_finite() && distance > 0.0) {
            return Err(eyre::Report::new(LifterError::Config(format!(
                "test distance must be > 0, got {distance}"
            ))));
        }
        if !(rest_s.is_finite() && rest_s >= 0.0) {
            return Err(eyre::Report::new(LifterError::InvalidDuration(rest_s)));
        }
        let lowest = self.calibration.lowest_height;
        let top = lowest + distance;
        if !self.calibration.contains(top) {
            return Err(eyre::Report::new(LifterError::OutOfRange {
                target: top,
                lowest,
                highest: self.calibration.highest_height,
            }));
        }

        tracing::info!(distance, rest_s, "test sequence start");
        let up = self.plan_and_execute_movement(top, Some(lowest));
        if !up.success {
            return Ok(TestSequenceReport {
                distance,
                rest_s,
                up,
                down: None,
            });
        }

        let poll_s = poll_secs(self.movement.cancel_poll_ms);
        let down = if sleep_interruptible(&*self.clock, &self.stop, rest_s, poll_s) {
            self.plan_and_execute_movement(lowest, None)
        } else {
            let start = self.state.last_known_position;
            self.rejected(LifterError::Cancelled, start)
        };
        let report = TestSequenceReport {
            distance,
            rest_s,
            up,
            down: Some(down),
        };
        tracing::info!(success = report.success(), "test sequence finished");
        Ok(report)
    }

    /// Operator reset: forget the usage history and up-time, set the position
    /// (lowest height when `None`).
    pub fn reset_state(&mut self, position: Option<f64>) -> Result<()> {
        let position = position.unwrap_or(self.calibration.lowest_height);
        self.check_height(position)?;
        self.state.ledger.clear();
        self.state.cumulative_up_time = 0.0;
        self.state.last_known_position = Some(position);
        self.persist().map_err(eyre::Report::new)?;
        tracing::info!(position, "state reset");
        Ok(())
    }

    /// Override the position estimate; the usage history is untouched.
    pub fn set_position(&mut self, height: f64) -> Result<()> {
        self.check_height(height)?;
        self.load_state().map_err(eyre::Report::new)?;
        let previous = self.state.last_known_position;
        self.state.last_known_position = Some(height);
        self.persist().map_err(eyre::Report::new)?;
        tracing::info!(height, ?previous, "position set");
        Ok(())
    }

    fn check_height(&self, height: f64) -> Result<()> {
        if height.is_finite() && self.calibration.contains(height) {
            Ok(())
        } else {
            Err(eyre::Report::new(LifterError::OutOfRange {
                target: height,
                lowest: self.calibration.lowest_height,
                highest: self.calibration.highest_height,
            }))
        }
    }

    fn rejected(&mut self, error: LifterError, start: Option<f64>) -> MovementResult {
        tracing::warn!(error = %error, "movement rejected");
        let status = self.duty_cycle_status();
        MovementResult::rejected(error, status, self.state.cumulative_up_time, start)
    }

    fn finish(
        &mut self,
        direction: Direction,
        start_height: Option<f64>,
        distance: Option<f64>,
        exec: Execution,
    ) -> MovementResult {
        let duty_cycle = self.duty_cycle_status();
        let end_height = self.state.last_known_position;
        match &exec.error {
            None => tracing::info!(
                %direction,
                ?end_height,
                driven_s = exec.driven_s,
                bursts = exec.bursts.len(),
                "movement complete"
            ),
            Some(e) => tracing::warn!(
                %direction,
                ?end_height,
                driven_s = exec.driven_s,
                bursts = exec.bursts.len(),
                error = %e,
                "movement aborted"
            ),
        }
        MovementResult {
            success: exec.error.is_none(),
            direction: Some(direction),
            start_height,
            end_height,
            distance,
            duration: Some(exec.driven_s),
            bursts: exec.bursts,
            duty_cycle,
            cumulative_up_time: self.state.cumulative_up_time,
            error: exec.error,
        }
    }

    /// Run `chunks` as consecutive bursts with rests in between. Each burst is
    /// authorized, recorded with its measured interval and persisted before
    /// the next one starts. Both lines are released on every exit.
    fn execute(&mut self, direction: Direction, chunks: &[f64], opts: MovementOptions) -> Execution {
        let Self {
            actuator,
            store,
            clock,
            calibration,
            movement,
            state,
            stop,
            unsaved,
            ..
        } = self;
        let clock: &dyn Clock = &**clock;
        let stop: &AtomicBool = stop;
        let poll_s = poll_secs(movement.cancel_poll_ms);
        let line = direction.line();
        let rate = calibration.rate(direction);

        let mut act = ReleaseGuard::new(&mut **actuator);
        let mut out = Execution::default();
        let mut waited_s = 0.0;

        for (i, &chunk) in chunks.iter().enumerate() {
            if i > 0 && !sleep_interruptible(clock, stop, movement.rest_between_bursts_s, poll_s) {
                out.error = Some(LifterError::Cancelled);
                break;
            }
            if stop.load(Ordering::Relaxed) {
                out.error = Some(LifterError::Cancelled);
                break;
            }
            if let Err(e) = await_budget(
                &mut state.ledger,
                clock,
                stop,
                movement,
                &opts,
                chunk,
                &mut waited_s,
            ) {
                out.error = Some(e);
                break;
            }

            let run = run_burst(&mut *act, clock, stop, line, chunk, poll_s);
            if run.error.is_none() || run.end > run.start {
                match state.ledger.record(run.start, run.end) {
                    Ok(iv) => {
                        let d = iv.duration();
                        out.bursts.push(iv);
                        out.driven_s += d;
                        if direction == Direction::Up {
                            state.cumulative_up_time += d;
                        }
                        if let Some(pos) = state.last_known_position {
                            state.last_known_position =
                                Some(calibration.clamp(pos + direction.sign() * rate * d));
                        }
                    }
                    Err(e) => {
                        out.error = Some(e);
                        break;
                    }
                }
                let saved = store.save(&state.to_record());
                *unsaved = saved.is_err();
                if let Err(e) = saved {
                    out.error = Some(run.error.unwrap_or(e));
                    break;
                }
            }
            if let Some(e) = run.error {
                out.error = Some(e);
                break;
            }
        }
        out
    }
}

/// Authorize `chunk`, optionally sleeping until the window has room.
///
/// `BurstTooLong` is never waited on. With `max_wait_s` set, gives up as soon
/// as the projected total wait would exceed it.
fn await_budget(
    ledger: &mut DutyCycleLedger,
    clock: &dyn Clock,
    stop: &AtomicBool,
    movement: &MovementCfg,
    opts: &MovementOptions,
    chunk: f64,
    waited_s: &mut f64,
) -> core::result::Result<(), LifterError> {
    loop {
        let now = clock.now();
        let rejection = match ledger.authorize(now, chunk) {
            Authorization::Authorized => return Ok(()),
            Authorization::Rejected(r) => r,
        };
        let needed = match rejection {
            Rejection::DutyCycleExceeded { .. } if opts.wait_for_budget => {
                ledger.time_until_available(now, chunk)
            }
            _ => None,
        };
        let Some(needed) = needed else {
            tracing::warn!(?rejection, chunk_s = chunk, "burst rejected");
            return Err(rejection.into());
        };
        if let Some(max) = opts.max_wait_s
            && *waited_s + needed > max
        {
            tracing::warn!(
                needed_s = needed,
                waited_s = *waited_s,
                max_wait_s = max,
                "duty-cycle wait would exceed limit"
            );
            return Err(rejection.into());
        }

        let nap = needed.max(MIN_WAIT_SLEEP_S).min(movement.max_wait_poll_s);
        tracing::info!(needed_s = needed, sleep_s = nap, "waiting for duty-cycle budget");
        let t0 = clock.now();
        let finished = sleep_interruptible(clock, stop, nap, poll_secs(movement.cancel_poll_ms));
        *waited_s += clock.secs_since(t0);
        if !finished {
            return Err(LifterError::Cancelled);
        }
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Lifter`. Configuration is validated and state is loaded on `build()`.
pub struct LifterBuilder<A, S, C> {
    actuator: Option<Box<dyn Actuator>>,
    store: Option<Box<dyn StateStore>>,
    calibration: Option<Calibration>,
    policy: Option<DutyCyclePolicy>,
    movement: Option<MovementCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    stop: Option<Arc<AtomicBool>>,
    _a: PhantomData<A>,
    _s: PhantomData<S>,
    _c: PhantomData<C>,
}

impl Default for LifterBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            actuator: None,
            store: None,
            calibration: None,
            policy: None,
            movement: None,
            clock: None,
            stop: None,
            _a: PhantomData,
            _s: PhantomData,
            _c: PhantomData,
        }
    }
}

impl<A, S, C> LifterBuilder<A, S, C> {
    fn retype<A2, S2, C2>(self) -> LifterBuilder<A2, S2, C2> {
        LifterBuilder {
            actuator: self.actuator,
            store: self.store,
            calibration: self.calibration,
            policy: self.policy,
            movement: self.movement,
            clock: self.clock,
            stop: self.stop,
            _a: PhantomData,
            _s: PhantomData,
            _c: PhantomData,
        }
    }

    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Lifter> {
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let calibration = self
            .calibration
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCalibration))?;
        let policy = self.policy.unwrap_or_default();
        let movement = self.movement.unwrap_or_default();

        calibration
            .validate()
            .map_err(|m| eyre::Report::new(BuildError::InvalidConfig(m)))?;
        policy
            .validate()
            .map_err(|m| eyre::Report::new(BuildError::InvalidConfig(m)))?;
        movement
            .validate()
            .map_err(|m| eyre::Report::new(BuildError::InvalidConfig(m)))?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(SystemClock::new()),
        };

        let mut lifter = Lifter {
            actuator,
            store,
            clock,
            calibration,
            policy,
            movement,
            state: LifterState::new(policy),
            stop: self.stop.unwrap_or_default(),
            unsaved: false,
        };
        lifter.load_state().map_err(eyre::Report::new)?;
        tracing::debug!(?lifter, "lifter ready");
        Ok(lifter)
    }
}

/// Chainable setters that do not affect type-state.
impl<A, S, C> LifterBuilder<A, S, C> {
    pub fn with_policy(mut self, policy: DutyCyclePolicy) -> Self {
        self.policy = Some(policy);
        self
    }
    pub fn with_movement(mut self, movement: MovementCfg) -> Self {
        self.movement = Some(movement);
        self
    }
    /// Provide a custom clock implementation; defaults to `SystemClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Share a cancellation flag (e.g. one raised by a signal handler).
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }
}

// Setters that advance type-state
impl<S, C> LifterBuilder<Missing, S, C> {
    pub fn with_actuator(self, actuator: impl Actuator + 'static) -> LifterBuilder<Set, S, C> {
        let mut next = self.retype();
        next.actuator = Some(Box::new(actuator));
        next
    }
}

impl<A, C> LifterBuilder<A, Missing, C> {
    pub fn with_store(self, store: impl StateStore + 'static) -> LifterBuilder<A, Set, C> {
        let mut next = self.retype();
        next.store = Some(Box::new(store));
        next
    }
}

impl<A, S> LifterBuilder<A, S, Missing> {
    pub fn with_calibration(self, calibration: Calibration) -> LifterBuilder<A, S, Set> {
        let mut next = self.retype();
        next.calibration = Some(calibration);
        next
    }

    /// Calibration, duty-cycle policy and movement knobs from a loaded config file.
    pub fn with_config(self, cfg: &lifter_config::Config) -> LifterBuilder<A, S, Set> {
        self.with_calibration(Calibration::from(&cfg.calibration))
            .with_policy(DutyCyclePolicy::from(&cfg.duty_cycle))
            .with_movement(MovementCfg::from(&cfg.movement))
    }
}

impl LifterBuilder<Set, Set, Set> {
    /// Validate and build the Lifter. Only available when actuator, store and calibration are set.
    pub fn build(self) -> Result<Lifter> {
        self.try_build()
    }
}

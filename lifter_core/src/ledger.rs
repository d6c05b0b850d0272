//! Sliding-window duty-cycle ledger.
//!
//! Usage is the measure of `[now - window_period, now]` intersected with the
//! union of recorded motor-on intervals. Clamping at the window edge keeps a
//! burst that straddles the boundary from counting in full, and the union
//! keeps overlapping records from counting twice.

use serde::{Deserialize, Serialize};

use crate::config::DutyCyclePolicy;
use crate::error::LifterError;

/// One recorded motor-on interval, epoch seconds.
///
/// Persisted as `[start, end, duration]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct UsageInterval {
    start: f64,
    end: f64,
    duration: f64,
}

impl UsageInterval {
    pub fn new(start: f64, end: f64) -> Result<Self, LifterError> {
        if !(start.is_finite() && end.is_finite()) {
            return Err(LifterError::State(format!(
                "usage interval bounds must be finite (start={start}, end={end})"
            )));
        }
        if end < start {
            return Err(LifterError::State(format!(
                "usage interval ends before it starts (start={start}, end={end})"
            )));
        }
        Ok(Self {
            start,
            end,
            duration: end - start,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Length of the part of this interval inside `[lo, hi]`.
    pub fn overlap(&self, lo: f64, hi: f64) -> f64 {
        (self.end.min(hi) - self.start.max(lo)).max(0.0)
    }
}

impl TryFrom<[f64; 3]> for UsageInterval {
    type Error = LifterError;

    // The stored duration is informational; it is recomputed from the bounds.
    fn try_from([start, end, _duration]: [f64; 3]) -> Result<Self, Self::Error> {
        Self::new(start, end)
    }
}

impl From<UsageInterval> for [f64; 3] {
    fn from(iv: UsageInterval) -> Self {
        [iv.start, iv.end, iv.duration]
    }
}

/// Why the ledger refused a burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Longer than the per-burst ceiling; waiting never helps, the caller must chunk.
    BurstTooLong { requested_s: f64, max_s: f64 },
    /// Not enough budget left in the current window.
    DutyCycleExceeded { wait_hint_s: f64, remaining_s: f64 },
    /// Negative or non-finite duration.
    InvalidDuration { requested_s: f64 },
}

impl From<Rejection> for LifterError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::BurstTooLong { requested_s, max_s } => {
                LifterError::BurstTooLong { requested_s, max_s }
            }
            Rejection::DutyCycleExceeded {
                wait_hint_s,
                remaining_s,
            } => LifterError::DutyCycleExceeded {
                wait_hint_s,
                remaining_s,
            },
            Rejection::InvalidDuration { requested_s } => {
                LifterError::InvalidDuration(requested_s)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Authorization {
    Authorized,
    Rejected(Rejection),
}

impl Authorization {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Authorization::Authorized)
    }
}

/// Snapshot reported by `query_duty_cycle_status`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DutyCycleStatus {
    pub current_usage: f64,
    pub max_usage: f64,
    pub remaining: f64,
    pub percentage_used: f64,
    pub window_period: f64,
}

/// History of motor-on intervals plus the limits they are judged against.
#[derive(Debug, Clone, PartialEq)]
pub struct DutyCycleLedger {
    intervals: Vec<UsageInterval>,
    policy: DutyCyclePolicy,
}

impl DutyCycleLedger {
    pub fn new(policy: DutyCyclePolicy) -> Self {
        Self {
            intervals: Vec::new(),
            policy,
        }
    }

    /// Rebuild from persisted intervals (kept in their stored order).
    pub fn with_intervals(policy: DutyCyclePolicy, intervals: Vec<UsageInterval>) -> Self {
        Self { intervals, policy }
    }

    pub fn policy(&self) -> &DutyCyclePolicy {
        &self.policy
    }

    pub fn intervals(&self) -> &[UsageInterval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.intervals.clear();
    }

    /// Drop every interval that ended at or before the window start.
    /// Returns how many were removed.
    pub fn prune(&mut self, now: f64) -> usize {
        let cutoff = now - self.policy.window_period_s;
        let before = self.intervals.len();
        self.intervals.retain(|iv| iv.end > cutoff);
        let removed = before - self.intervals.len();
        if removed > 0 {
            tracing::trace!(removed, cutoff, "pruned usage intervals");
        }
        removed
    }

    /// Seconds of motor-on time inside `[now - window_period, now]`.
    pub fn current_usage(&mut self, now: f64) -> f64 {
        self.prune(now);
        self.window_segments(now)
            .iter()
            .fold(0.0, |acc, (a, b)| acc + (b - a))
    }

    /// Budget left in the current window, never negative.
    pub fn remaining(&mut self, now: f64) -> f64 {
        (self.policy.max_on_time_s - self.current_usage(now)).max(0.0)
    }

    /// Decide whether a burst of `requested_s` may start at `now`.
    pub fn authorize(&mut self, now: f64, requested_s: f64) -> Authorization {
        if !(requested_s.is_finite() && requested_s >= 0.0) {
            return Authorization::Rejected(Rejection::InvalidDuration { requested_s });
        }
        if requested_s > self.policy.max_continuous_burst_s {
            return Authorization::Rejected(Rejection::BurstTooLong {
                requested_s,
                max_s: self.policy.max_continuous_burst_s,
            });
        }
        let usage = self.current_usage(now);
        if usage + requested_s > self.policy.max_on_time_s {
            let remaining_s = (self.policy.max_on_time_s - usage).max(0.0);
            return Authorization::Rejected(Rejection::DutyCycleExceeded {
                wait_hint_s: requested_s - remaining_s,
                remaining_s,
            });
        }
        Authorization::Authorized
    }

    /// Append an executed burst. Bursts run sequentially, so append order is
    /// chronological.
    pub fn record(&mut self, start: f64, end: f64) -> Result<UsageInterval, LifterError> {
        let iv = UsageInterval::new(start, end)?;
        self.intervals.push(iv);
        Ok(iv)
    }

    pub fn status(&mut self, now: f64) -> DutyCycleStatus {
        let current_usage = self.current_usage(now);
        let max_usage = self.policy.max_on_time_s;
        DutyCycleStatus {
            current_usage,
            max_usage,
            remaining: (max_usage - current_usage).max(0.0),
            percentage_used: current_usage / max_usage * 100.0,
            window_period: self.policy.window_period_s,
        }
    }

    /// Seconds from `now` until a burst of `requested_s` would be admitted,
    /// assuming nothing else is recorded meanwhile. `None` when it never can.
    pub fn time_until_available(&mut self, now: f64, requested_s: f64) -> Option<f64> {
        if !(requested_s.is_finite() && requested_s >= 0.0)
            || requested_s > self.policy.max_continuous_burst_s
            || requested_s > self.policy.max_on_time_s
        {
            return None;
        }
        self.prune(now);
        let budget = self.policy.max_on_time_s - requested_s;

        // Usage only shrinks as the window slides forward. Walk back from the
        // newest segment to find the earliest window start that leaves at most
        // `budget` seconds inside it.
        let mut acc = 0.0;
        for (a, b) in self.window_segments(now).iter().rev() {
            let len = b - a;
            if acc + len > budget {
                let window_start = b - (budget - acc);
                return Some((window_start + self.policy.window_period_s - now).max(0.0));
            }
            acc += len;
        }
        Some(0.0)
    }

    /// Disjoint, sorted pieces of the interval union clipped to the window.
    fn window_segments(&self, now: f64) -> Vec<(f64, f64)> {
        let lo = now - self.policy.window_period_s;
        let mut clipped: Vec<(f64, f64)> = self
            .intervals
            .iter()
            .filter_map(|iv| {
                let a = iv.start.max(lo);
                let b = iv.end.min(now);
                (b > a).then_some((a, b))
            })
            .collect();
        clipped.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut merged: Vec<(f64, f64)> = Vec::with_capacity(clipped.len());
        for (a, b) in clipped {
            match merged.last_mut() {
                Some(last) if a <= last.1 => last.1 = last.1.max(b),
                _ => merged.push((a, b)),
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f64 = 1_000_000.0;

    fn ledger(intervals: &[(f64, f64)]) -> DutyCycleLedger {
        let ivs = intervals
            .iter()
            .map(|&(a, b)| UsageInterval::new(a, b).unwrap())
            .collect();
        DutyCycleLedger::with_intervals(DutyCyclePolicy::default(), ivs)
    }

    #[test]
    fn interval_rejects_inverted_bounds() {
        assert!(UsageInterval::new(10.0, 5.0).is_err());
        assert!(UsageInterval::new(f64::NAN, 5.0).is_err());
        let iv = UsageInterval::new(5.0, 5.0).unwrap();
        assert_eq!(iv.duration(), 0.0);
    }

    #[test]
    fn interval_serializes_as_triple() {
        let iv = UsageInterval::new(100.0, 112.5).unwrap();
        let s = serde_json::to_string(&iv).unwrap();
        assert_eq!(s, "[100.0,112.5,12.5]");
        let back: UsageInterval = serde_json::from_str("[100.0,112.5,99.0]").unwrap();
        assert_eq!(back.duration(), 12.5);
    }

    #[test]
    fn interval_deserialize_rejects_inverted() {
        let r: Result<UsageInterval, _> = serde_json::from_str("[100.0,90.0,-10.0]");
        assert!(r.is_err());
    }

    #[test]
    fn prune_boundary_is_inclusive() {
        // end == now - window is gone; end just after stays.
        let mut l = ledger(&[(T - 1300.0, T - 1200.0), (T - 1250.0, T - 1199.0)]);
        assert_eq!(l.prune(T), 1);
        assert_eq!(l.intervals().len(), 1);
        assert_eq!(l.prune(T), 0);
    }

    #[test]
    fn overlapping_records_are_not_double_counted() {
        let mut l = ledger(&[(T - 100.0, T - 50.0), (T - 70.0, T - 40.0)]);
        assert!((l.current_usage(T) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn time_until_available_empty_is_zero() {
        let mut l = ledger(&[]);
        assert_eq!(l.time_until_available(T, 30.0), Some(0.0));
    }

    #[test]
    fn time_until_available_never_for_impossible_requests() {
        let mut l = ledger(&[]);
        assert_eq!(l.time_until_available(T, 31.0), None);
        assert_eq!(l.time_until_available(T, -1.0), None);
    }

    #[test]
    fn time_until_available_slides_out_oldest_usage() {
        // 100 s used ending at T; a 30 s request needs 10 s of it to leave the window.
        let mut l = ledger(&[(T - 100.0, T)]);
        let wait = l.time_until_available(T, 30.0).unwrap();
        assert!((wait - 1110.0).abs() < 1e-6, "wait = {wait}");
        assert!(l.authorize(T + wait, 30.0).is_authorized());
        assert!(!l.authorize(T + wait - 1.0, 30.0).is_authorized());
    }

    #[test]
    fn status_reports_percentage() {
        let mut l = ledger(&[(T - 60.0, T)]);
        let s = l.status(T);
        assert!((s.current_usage - 60.0).abs() < 1e-9);
        assert!((s.remaining - 60.0).abs() < 1e-9);
        assert!((s.percentage_used - 50.0).abs() < 1e-9);
        assert_eq!(s.max_usage, 120.0);
        assert_eq!(s.window_period, 1200.0);
    }
}

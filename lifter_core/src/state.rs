//! Persisted lifter state: the ledger history, the position estimate and
//! cumulative up-time.

use serde::{Deserialize, Serialize};

use crate::config::DutyCyclePolicy;
use crate::error::LifterError;
use crate::ledger::{DutyCycleLedger, UsageInterval};

/// On-disk shape of the state file.
///
/// ```json
/// {"usage_periods": [[start, end, duration]], "last_position": 23.7, "total_up_time": 12.5}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRecord {
    pub usage_periods: Vec<UsageInterval>,
    pub last_position: Option<f64>,
    #[serde(alias = "cumulative_up_time")]
    pub total_up_time: f64,
}

impl StateRecord {
    pub fn from_json(s: &str) -> Result<Self, LifterError> {
        let rec: Self = serde_json::from_str(s)
            .map_err(|e| LifterError::State(format!("parse state: {e}")))?;
        if let Some(p) = rec.last_position
            && !p.is_finite()
        {
            return Err(LifterError::State(format!("last_position must be finite, got {p}")));
        }
        if !(rec.total_up_time.is_finite() && rec.total_up_time >= 0.0) {
            return Err(LifterError::State(format!(
                "total_up_time must be finite and >= 0, got {}",
                rec.total_up_time
            )));
        }
        Ok(rec)
    }

    pub fn to_json(&self) -> Result<String, LifterError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LifterError::State(format!("serialize state: {e}")))
    }
}

/// Everything the lifter remembers between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct LifterState {
    pub ledger: DutyCycleLedger,
    /// Estimated height in inches; `None` until the operator provides one.
    pub last_known_position: Option<f64>,
    /// Seconds spent moving up since the last reset.
    pub cumulative_up_time: f64,
}

impl LifterState {
    pub fn new(policy: DutyCyclePolicy) -> Self {
        Self {
            ledger: DutyCycleLedger::new(policy),
            last_known_position: None,
            cumulative_up_time: 0.0,
        }
    }

    pub fn from_record(policy: DutyCyclePolicy, rec: StateRecord) -> Self {
        Self {
            ledger: DutyCycleLedger::with_intervals(policy, rec.usage_periods),
            last_known_position: rec.last_position,
            cumulative_up_time: rec.total_up_time,
        }
    }

    pub fn to_record(&self) -> StateRecord {
        StateRecord {
            usage_periods: self.ledger.intervals().to_vec(),
            last_position: self.last_known_position,
            total_up_time: self.cumulative_up_time,
        }
    }
}

#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and rate calibration parsing for the desk lifter.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The rate calibration CSV loader enforces headers and fits inches/second
//!   for each direction from timed test runs.
use serde::Deserialize;

/// Rate calibration CSV schema.
///
/// Expected headers:
/// direction,seconds,inches
///
/// Example:
/// direction,seconds,inches
/// up,10.0,5.4
/// down,10.0,5.5
#[derive(Debug, Deserialize, Clone)]
pub struct RateRow {
    pub direction: String,
    pub seconds: f64,
    pub inches: f64,
}

/// BCM pin numbers of the relay lines.
#[derive(Debug, Deserialize)]
pub struct Pins {
    pub up: u8,
    pub down: u8,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseMode {
    /// Switch the pin to an input with no bias ("button not pressed").
    #[default]
    HighZ,
    /// Keep the pin as an output at its inactive level.
    Inactive,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Relay {
    /// Relay boards that switch on a low level (most opto-isolated boards).
    pub active_low: bool,
    pub release: ReleaseMode,
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            active_low: true,
            release: ReleaseMode::HighZ,
        }
    }
}

/// Installation-specific travel range and speeds.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationCfg {
    /// inches
    pub lowest_height: f64,
    /// inches
    pub highest_height: f64,
    /// inches per second while the UP line is driven
    pub up_rate: f64,
    /// inches per second while the DOWN line is driven
    pub down_rate: f64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DutyCycleCfg {
    /// Length of the sliding window (s)
    pub window_period_s: f64,
    /// Maximum motor on-time inside any window (s)
    pub max_on_time_s: f64,
    /// Hard ceiling for a single continuous burst (s)
    pub max_continuous_burst_s: f64,
}

impl Default for DutyCycleCfg {
    fn default() -> Self {
        Self {
            window_period_s: 1200.0,
            max_on_time_s: 120.0,
            max_continuous_burst_s: 30.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MovementCfg {
    /// Deltas smaller than this are treated as "already there" (inches)
    pub tolerance_in: f64,
    /// Rest between consecutive bursts of one movement (s)
    pub rest_between_bursts_s: f64,
    /// How often a running burst checks for cancellation (ms)
    pub cancel_poll_ms: u64,
    /// Longest single sleep while waiting for duty-cycle budget (s)
    pub max_wait_poll_s: f64,
}

impl Default for MovementCfg {
    fn default() -> Self {
        Self {
            tolerance_in: 0.01,
            rest_between_bursts_s: 2.0,
            cancel_poll_ms: 50,
            max_wait_poll_s: 30.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StateCfg {
    /// Path to the persisted ledger/position JSON file
    pub file: String,
}

impl Default for StateCfg {
    fn default() -> Self {
        Self {
            file: "lifter_state.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub relay: Relay,
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub duty_cycle: DutyCycleCfg,
    #[serde(default)]
    pub movement: MovementCfg,
    #[serde(default)]
    pub state: StateCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Fitted travel speeds, inches per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateCalibration {
    pub up_rate: f64,
    pub down_rate: f64,
}

impl RateCalibration {
    /// Fit `inches = rate * seconds` per direction by least squares through
    /// the origin. Each direction needs at least one run with seconds > 0.
    pub fn from_rows(rows: &[RateRow]) -> eyre::Result<Self> {
        if rows.is_empty() {
            eyre::bail!("rate calibration requires at least one row per direction");
        }

        // (sum s*i, sum s*s) per direction
        let mut up = (0.0f64, 0.0f64, 0usize);
        let mut down = (0.0f64, 0.0f64, 0usize);
        for (idx, r) in rows.iter().enumerate() {
            if !(r.seconds.is_finite() && r.seconds > 0.0) {
                eyre::bail!("rate calibration row {} has non-positive seconds", idx + 2);
            }
            if !(r.inches.is_finite() && r.inches > 0.0) {
                eyre::bail!("rate calibration row {} has non-positive inches", idx + 2);
            }
            let acc = match r.direction.trim().to_ascii_lowercase().as_str() {
                "up" => &mut up,
                "down" => &mut down,
                other => eyre::bail!(
                    "rate calibration row {} has unknown direction '{}' (expected up|down)",
                    idx + 2,
                    other
                ),
            };
            acc.0 += r.seconds * r.inches;
            acc.1 += r.seconds * r.seconds;
            acc.2 += 1;
        }

        let fit = |name: &str, (sxy, sxx, n): (f64, f64, usize)| -> eyre::Result<f64> {
            if n == 0 {
                eyre::bail!("rate calibration has no '{name}' rows");
            }
            let rate = sxy / sxx;
            if !rate.is_finite() || rate <= 0.0 {
                eyre::bail!("rate calibration produced invalid {name} rate");
            }
            Ok(rate)
        };

        Ok(Self {
            up_rate: fit("up", up)?,
            down_rate: fit("down", down)?,
        })
    }
}

impl TryFrom<&[RateRow]> for RateCalibration {
    type Error = eyre::Report;
    fn try_from(rows: &[RateRow]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_rate_csv(path: &std::path::Path) -> eyre::Result<RateCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open rate calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["direction", "seconds", "inches"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "rate calibration CSV must have headers 'direction,seconds,inches', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<RateRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    RateCalibration::try_from(rows.as_slice())
}

impl Config {
    /// Replace the TOML rates with fitted ones.
    pub fn apply_rates(&mut self, rates: RateCalibration) {
        self.calibration.up_rate = rates.up_rate;
        self.calibration.down_rate = rates.down_rate;
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        if self.pins.up == self.pins.down {
            eyre::bail!("pins.up and pins.down must be different");
        }
        if self.pins.up > 27 || self.pins.down > 27 {
            eyre::bail!("pins must be BCM GPIO numbers in [0, 27]");
        }

        // Calibration
        let c = &self.calibration;
        if !c.lowest_height.is_finite() || !c.highest_height.is_finite() {
            eyre::bail!("calibration heights must be finite");
        }
        if c.lowest_height < 0.0 {
            eyre::bail!("calibration.lowest_height must be >= 0");
        }
        if c.highest_height <= c.lowest_height {
            eyre::bail!("calibration.highest_height must be > calibration.lowest_height");
        }
        if !(c.up_rate.is_finite() && c.up_rate > 0.0) {
            eyre::bail!("calibration.up_rate must be > 0");
        }
        if !(c.down_rate.is_finite() && c.down_rate > 0.0) {
            eyre::bail!("calibration.down_rate must be > 0");
        }

        // Duty cycle
        let d = &self.duty_cycle;
        if !(d.window_period_s.is_finite() && d.window_period_s > 0.0) {
            eyre::bail!("duty_cycle.window_period_s must be > 0");
        }
        if !(d.max_on_time_s.is_finite() && d.max_on_time_s > 0.0) {
            eyre::bail!("duty_cycle.max_on_time_s must be > 0");
        }
        if d.max_on_time_s > d.window_period_s {
            eyre::bail!("duty_cycle.max_on_time_s must be <= duty_cycle.window_period_s");
        }
        if !(d.max_continuous_burst_s.is_finite() && d.max_continuous_burst_s > 0.0) {
            eyre::bail!("duty_cycle.max_continuous_burst_s must be > 0");
        }
        if d.max_continuous_burst_s > d.max_on_time_s {
            eyre::bail!("duty_cycle.max_continuous_burst_s must be <= duty_cycle.max_on_time_s");
        }

        // Movement
        let m = &self.movement;
        if !(m.tolerance_in.is_finite() && m.tolerance_in > 0.0 && m.tolerance_in < 1.0) {
            eyre::bail!("movement.tolerance_in must be in (0.0, 1.0)");
        }
        if !(m.rest_between_bursts_s.is_finite() && m.rest_between_bursts_s >= 0.0) {
            eyre::bail!("movement.rest_between_bursts_s must be >= 0");
        }
        if m.cancel_poll_ms == 0 {
            eyre::bail!("movement.cancel_poll_ms must be >= 1");
        }
        if m.cancel_poll_ms > 1_000 {
            eyre::bail!("movement.cancel_poll_ms is unreasonably large (>1s)");
        }
        if !(m.max_wait_poll_s.is_finite() && m.max_wait_poll_s > 0.0) {
            eyre::bail!("movement.max_wait_poll_s must be > 0");
        }

        // State
        if self.state.file.trim().is_empty() {
            eyre::bail!("state.file must not be empty");
        }

        Ok(())
    }
}

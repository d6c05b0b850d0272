//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use lifter_core::Direction;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "lifter", version, about = "Desk lifter CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/lifter_config.toml")]
    pub config: PathBuf,

    /// Optional rate calibration CSV (strict header: direction,seconds,inches)
    #[arg(long, value_name = "FILE")]
    pub rates: Option<PathBuf>,

    /// Override the state file from the config
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Print one JSON object per command and log as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Travel direction as typed on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DirArg {
    Up,
    Down,
}

impl From<DirArg> for Direction {
    fn from(d: DirArg) -> Self {
        match d {
            DirArg::Up => Direction::Up,
            DirArg::Down => Direction::Down,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move to a target height, in bursts that respect the duty cycle
    Move {
        /// Target height in inches
        #[arg(long)]
        target: f64,
        /// Current height in inches; defaults to the stored position
        #[arg(long)]
        current: Option<f64>,
        /// Sleep until the duty-cycle budget admits each burst instead of failing
        #[arg(long, action = ArgAction::SetTrue)]
        wait: bool,
        /// Give up waiting after this many seconds (only with --wait)
        #[arg(long, value_name = "SECONDS", requires = "wait")]
        max_wait_s: Option<f64>,
    },
    /// Show duty-cycle usage, position and up-time
    Status,
    /// Single short burst in one direction
    Nudge {
        #[arg(long, value_enum)]
        direction: DirArg,
        /// Motor-on time in seconds (at most one continuous burst)
        #[arg(long)]
        seconds: f64,
    },
    /// From the lowest height: go up, rest, come back down
    TestSequence {
        /// Travel in inches
        #[arg(long, default_value_t = 0.5)]
        distance: f64,
        /// Rest between the two legs, seconds
        #[arg(long = "rest-s", default_value_t = 10.0)]
        rest_s: f64,
    },
    /// Clear usage history and up-time after a manual reset of the desk
    Reset {
        /// Position to record; defaults to the lowest height
        #[arg(long)]
        position: Option<f64>,
    },
    /// Override the stored position without touching usage history
    SetPosition {
        /// Height in inches
        height: f64,
    },
    /// Quick health check (config, state lock, relay lines)
    SelfCheck,
}

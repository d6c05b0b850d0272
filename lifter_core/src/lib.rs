#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core lifter logic (hardware-agnostic).
//!
//! This crate provides the duty-cycle accounting and movement engine for a
//! relay-driven desk lift. All hardware interactions go through
//! `lifter_traits::Actuator`; time comes from `lifter_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Ledger**: sliding-window motor-on history, authorization (`ledger` module)
//! - **Planner**: height delta to timed bursts (`planner` module)
//! - **State**: persisted history, position estimate, up-time (`state`, `store`)
//! - **Lifter**: facade that authorizes, drives, records and persists (`lifter` module)
//!
//! ## Time
//!
//! All timestamps are epoch seconds as `f64`, the unit the state file stores.
//! Usage is measured over the union of recorded intervals clipped to the
//! window, so overlapping records never count twice.

mod burst;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod ledger;
pub mod lifter;
pub mod mocks;
pub mod planner;
pub mod state;
pub mod status;
pub mod store;
pub mod util;

pub use config::{Calibration, DutyCyclePolicy, MovementCfg, MovementOptions};
pub use error::{BuildError, LifterError, Report, Result};
pub use ledger::{Authorization, DutyCycleLedger, DutyCycleStatus, Rejection, UsageInterval};
pub use lifter::{Lifter, LifterBuilder, Missing, Set};
pub use planner::{Direction, MovementPlan, Plan, chunk_duration, plan_movement};
pub use state::{LifterState, StateRecord};
pub use status::{MovementResult, TestSequenceReport};
pub use store::{JsonFileStore, StateStore, write_atomic};

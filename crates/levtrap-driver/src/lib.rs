// SPDX-License-Identifier: AGPL-3.0-only

//! Driver and tuning logic for the levitated-particle feedback FPGA.
//!
//! The feedback core (a PD compensator in programmable logic) is configured
//! through three memory-mapped words. This crate maps them, exposes them as
//! typed parameters, and runs the adaptive k_d search against live energy
//! readings.
//!
//! # Layers
//!
//! ```text
//! GainSearch        — secant descent over k_d, manual or automatic
//!   GainController  — delay / gain / energy, saturating, read-after-write
//!     RegisterPort  — whole-word read/write
//!       DevMemPort     — /dev/mem pages (hardware)
//!       SimulatedTrap  — in-memory words + energy model (rehearsal, tests)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use levtrap_driver::{DevMemConfig, DevMemPort, GainController, GainSearch, SearchConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = DevMemPort::open(&DevMemConfig::default())?;
//! let mut ctl = GainController::new(port);
//!
//! ctl.set_delay(120);
//! let outcome = GainSearch::new(&mut ctl, SearchConfig::default()).run_automatic(&mut ());
//! println!("k_d={} energy={}", outcome.k_d, outcome.energy);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod controller;
mod error;
mod port;
pub mod search;

pub use backends::{DevMemConfig, DevMemPort, QuadraticBowl, SimulatedTrap, TrapState};
pub use controller::{GainController, Settings};
pub use error::{Result, TrapError};
pub use levtrap_chip::GainPair;
pub use port::{BackendType, Page, Register, RegisterPort};
pub use search::{
    GainSearch, SearchConfig, SearchMode, SearchMonitor, SearchOutcome, SearchState, StepReport,
    Termination,
};

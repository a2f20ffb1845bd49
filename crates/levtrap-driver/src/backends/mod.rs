// SPDX-License-Identifier: AGPL-3.0-only

//! Register port implementations
//!
//! Two backends available:
//! - **DevMem**: both register pages mapped from `/dev/mem` (real hardware, root)
//! - **Simulated**: in-memory register file with a synthetic energy model

pub mod devmem;
pub mod mmap;
pub mod simulated;

pub use devmem::{DevMemConfig, DevMemPort};
pub use simulated::{QuadraticBowl, SimulatedTrap, TrapState};

// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated register port
//!
//! An in-memory copy of the three register words with an energy model
//! standing in for the out-of-loop detector. It serves two purposes:
//!
//! 1. **Operator rehearsal**: the console runs against it with `--simulate`,
//!    so a tuning session can be tried without the trap powered up.
//! 2. **Tests without hardware**: it counts every read and write per
//!    register, so callers can check exactly how much bus traffic an
//!    operation costs.
//!
//! The register file behaves like the FPGA's AXI GPIO: words store whatever
//! is written, including reserved bits, and the energy word is read-only.

use crate::port::{BackendType, Register, RegisterPort};
use levtrap_chip::{codec, regs, GainPair};
use std::cell::Cell;

/// What the energy model sees when a sample is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapState {
    /// Delay cycles currently in the delay word.
    pub delay: u16,
    /// Gains currently in the gain word.
    pub gains: GainPair,
    /// Number of energy samples taken before this one.
    pub sample: u64,
}

/// Quadratic energy landscape in k_d with a linear delay penalty.
///
/// `E = floor + curvature * (k_d - optimum_k_d)^2 + delay_weight * delay`,
/// saturated to the 16-bit detector range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticBowl {
    /// k_d at the bottom of the bowl.
    pub optimum_k_d: f64,
    /// Energy units per squared unit of k_d error.
    pub curvature: f64,
    /// Residual energy at the optimum.
    pub floor: f64,
    /// Energy units added per delay cycle.
    pub delay_weight: f64,
}

impl Default for QuadraticBowl {
    fn default() -> Self {
        Self {
            optimum_k_d: -50.0,
            curvature: 1.0,
            floor: 120.0,
            delay_weight: 0.1,
        }
    }
}

impl QuadraticBowl {
    /// Detector reading for a trap state.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn energy(&self, state: &TrapState) -> u16 {
        let err = f64::from(state.gains.k_d) - self.optimum_k_d;
        let e = self.floor + self.curvature * err * err + self.delay_weight * f64::from(state.delay);
        e.clamp(0.0, f64::from(regs::ENERGY_MAX)) as u16
    }
}

type EnergyModel = Box<dyn Fn(&TrapState) -> u16>;

/// In-memory register port.
pub struct SimulatedTrap {
    words: [u32; 3],
    model: EnergyModel,
    samples: Cell<u64>,
    reads: [Cell<usize>; 3],
    writes: [usize; 3],
}

impl std::fmt::Debug for SimulatedTrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTrap")
            .field("delay", &format_args!("{:#010x}", self.words[Register::Delay.index()]))
            .field("gain", &format_args!("{:#010x}", self.words[Register::Gain.index()]))
            .field("samples", &self.samples.get())
            .finish_non_exhaustive()
    }
}

impl Default for SimulatedTrap {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTrap {
    /// Zeroed registers and the default [`QuadraticBowl`].
    #[must_use]
    pub fn new() -> Self {
        let bowl = QuadraticBowl::default();
        Self::with_model(move |state| bowl.energy(state))
    }

    /// Zeroed registers and a custom energy model.
    pub fn with_model(model: impl Fn(&TrapState) -> u16 + 'static) -> Self {
        Self {
            words: [0; 3],
            model: Box::new(model),
            samples: Cell::new(0),
            reads: Default::default(),
            writes: [0; 3],
        }
    }

    /// Preload a register word without counting it as a write.
    #[must_use]
    pub fn with_word(mut self, register: Register, word: u32) -> Self {
        self.words[register.index()] = word;
        self
    }

    /// Current trap state as the energy model would see it.
    pub fn state(&self) -> TrapState {
        TrapState {
            delay: codec::decode_delay(self.words[Register::Delay.index()]),
            gains: codec::decode_gain_pair(self.words[Register::Gain.index()]),
            sample: self.samples.get(),
        }
    }

    /// Raw word without counting a read.
    pub fn peek(&self, register: Register) -> u32 {
        match register {
            Register::Energy => u32::from((self.model)(&self.state())),
            _ => self.words[register.index()],
        }
    }

    /// Reads of `register` since construction or the last reset.
    pub fn reads(&self, register: Register) -> usize {
        self.reads[register.index()].get()
    }

    /// Writes to `register` since construction or the last reset.
    pub fn writes(&self, register: Register) -> usize {
        self.writes[register.index()]
    }

    /// Zero the access counters.
    pub fn reset_counters(&mut self) {
        for c in &self.reads {
            c.set(0);
        }
        self.writes = [0; 3];
    }
}

impl RegisterPort for SimulatedTrap {
    fn read_word(&self, register: Register) -> u32 {
        let cell = &self.reads[register.index()];
        cell.set(cell.get() + 1);

        let word = self.peek(register);
        if register == Register::Energy {
            self.samples.set(self.samples.get() + 1);
        }
        tracing::trace!("sim read {register} = {word:#010x}");
        word
    }

    fn write_word(&mut self, register: Register, word: u32) {
        self.writes[register.index()] += 1;
        if !register.is_writable() {
            tracing::warn!("Dropping write of {word:#010x} to read-only {register} register");
            return;
        }
        tracing::trace!("sim write {register} = {word:#010x}");
        self.words[register.index()] = word;
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Simulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_store_what_is_written() {
        let mut sim = SimulatedTrap::new();
        sim.write_word(Register::Gain, 0xFFFB_0003);
        assert_eq!(sim.read_word(Register::Gain), 0xFFFB_0003);
        assert_eq!(sim.writes(Register::Gain), 1);
        assert_eq!(sim.reads(Register::Gain), 1);
    }

    #[test]
    fn energy_word_ignores_writes() {
        let mut sim = SimulatedTrap::with_model(|_| 42);
        sim.write_word(Register::Energy, 7);
        assert_eq!(sim.read_word(Register::Energy), 42);
    }

    #[test]
    fn bowl_bottoms_out_at_optimum() {
        let bowl = QuadraticBowl::default();
        let at = |k_d: i16| {
            bowl.energy(&TrapState {
                delay: 0,
                gains: GainPair { k_p: 0, k_d },
                sample: 0,
            })
        };
        assert_eq!(at(-50), 120);
        assert!(at(-40) > at(-50));
        assert!(at(-60) > at(-50));
        assert_eq!(at(i16::MAX), regs::ENERGY_MAX);
    }

    #[test]
    fn model_sees_sample_index() {
        let sim = SimulatedTrap::with_model(|s| if s.sample % 2 == 0 { 10 } else { 20 });
        assert_eq!(sim.read_word(Register::Energy), 10);
        assert_eq!(sim.read_word(Register::Energy), 20);
        assert_eq!(sim.peek(Register::Energy), 10);
        assert_eq!(sim.reads(Register::Energy), 2);
    }

    #[test]
    fn reset_clears_counters_not_words() {
        let mut sim = SimulatedTrap::new().with_word(Register::Delay, 250);
        sim.write_word(Register::Gain, 1);
        let _ = sim.read_word(Register::Delay);
        sim.reset_counters();
        assert_eq!(sim.reads(Register::Delay), 0);
        assert_eq!(sim.writes(Register::Gain), 0);
        assert_eq!(sim.peek(Register::Delay), 250);
        assert_eq!(sim.state().gains.k_p, 1);
    }
}

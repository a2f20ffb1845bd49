// SPDX-License-Identifier: AGPL-3.0-only

//! Gain controller facade
//!
//! Parameter-level access to the feedback core. Every getter is exactly one
//! register read and nothing is cached, so each call reflects live hardware.
//! Setters saturate their input, write one word, and read it back so the
//! caller reports what the hardware holds rather than what was asked for.

use crate::port::{Register, RegisterPort};
use levtrap_chip::{codec, GainPair};
use tracing::debug;

/// Delay and gains as read from hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Loop delay in clock cycles
    pub delay: u16,
    /// Proportional / derivative gains
    pub gains: GainPair,
}

/// Parameter-level front end over a [`RegisterPort`].
#[derive(Debug)]
pub struct GainController<P> {
    port: P,
}

impl<P: RegisterPort> GainController<P> {
    /// Wrap a register port.
    pub fn new(port: P) -> Self {
        debug!("Gain controller on {} backend", port.backend_type());
        Self { port }
    }

    /// Underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Underlying port, mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Loop delay in clock cycles.
    pub fn delay(&self) -> u16 {
        codec::decode_delay(self.port.read_word(Register::Delay))
    }

    /// Saturate `cycles` to `[0, 500]`, write it, and return the read-back.
    ///
    /// The reserved upper half of the word is written as zero.
    pub fn set_delay(&mut self, cycles: i64) -> u16 {
        let word = codec::encode_delay_word(cycles);
        debug!("delay <- {cycles} (word {word:#010x})");
        self.port.write_word(Register::Delay, word);
        self.delay()
    }

    /// Current k_p / k_d.
    pub fn gain_pair(&self) -> GainPair {
        codec::decode_gain_pair(self.port.read_word(Register::Gain))
    }

    /// Saturate both gains to `±8191`, write them in one word, and return
    /// the read-back pair.
    pub fn set_gain_pair(&mut self, k_p: i64, k_d: i64) -> GainPair {
        let word = codec::encode_gain_pair(k_p, k_d);
        debug!("gains <- k_p={k_p} k_d={k_d} (word {word:#010x})");
        self.port.write_word(Register::Gain, word);
        self.gain_pair()
    }

    /// Turn the feedback off by zeroing both gains.
    pub fn zero_gains(&mut self) -> GainPair {
        self.set_gain_pair(0, 0)
    }

    /// Latest detector energy.
    pub fn energy(&self) -> u16 {
        codec::decode_energy(self.port.read_word(Register::Energy))
    }

    /// Delay and gains, read live.
    pub fn settings(&self) -> Settings {
        Settings {
            delay: self.delay(),
            gains: self.gain_pair(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SimulatedTrap;

    #[test]
    fn delay_is_masked_not_sign_extended() {
        let ctl = GainController::new(SimulatedTrap::new().with_word(Register::Delay, 0xDEAD_FFFF));
        assert_eq!(ctl.delay(), 0xFFFF);
    }

    #[test]
    fn set_delay_zero_fills_reserved_bits() {
        let mut ctl =
            GainController::new(SimulatedTrap::new().with_word(Register::Delay, 0xFFFF_0000));
        assert_eq!(ctl.set_delay(123), 123);
        assert_eq!(ctl.port().peek(Register::Delay), 123);
    }

    #[test]
    fn setters_cost_one_write_and_one_read() {
        let mut ctl = GainController::new(SimulatedTrap::new());
        ctl.set_gain_pair(3, -4);
        ctl.set_delay(10);
        let sim = ctl.port();
        assert_eq!(sim.writes(Register::Gain), 1);
        assert_eq!(sim.reads(Register::Gain), 1);
        assert_eq!(sim.writes(Register::Delay), 1);
        assert_eq!(sim.reads(Register::Delay), 1);
        assert_eq!(sim.reads(Register::Energy), 0);
    }

    #[test]
    fn zero_gains_clears_both_fields() {
        let mut ctl =
            GainController::new(SimulatedTrap::new().with_word(Register::Gain, 0x1234_5678));
        assert_eq!(ctl.zero_gains(), GainPair::ZERO);
        assert_eq!(ctl.port().peek(Register::Gain), 0);
    }

    #[test]
    fn energy_reads_low_half() {
        let ctl = GainController::new(SimulatedTrap::with_model(|_| 0xBEEF));
        assert_eq!(ctl.energy(), 0xBEEF);
    }

    #[test]
    fn settings_reflect_hardware() {
        let ctl = GainController::new(
            SimulatedTrap::new()
                .with_word(Register::Delay, 42)
                .with_word(Register::Gain, 0xFFFF_0002),
        );
        let s = ctl.settings();
        assert_eq!(s.delay, 42);
        assert_eq!(s.gains, GainPair { k_p: 2, k_d: -1 });
    }
}

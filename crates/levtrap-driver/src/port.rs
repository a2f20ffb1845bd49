// SPDX-License-Identifier: AGPL-3.0-only

//! Register Access Port abstraction
//!
//! The feedback core exposes three 32-bit words over two mapped pages.
//! Everything above this trait talks in whole words; field packing lives in
//! `levtrap_chip::codec`.

use levtrap_chip::regs;
use std::fmt::Debug;

/// A register word the software reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Loop delay, delay page offset 0.
    Delay,
    /// Detector energy, delay page offset 8. Read-only.
    Energy,
    /// k_p / k_d pair, gain page offset 0.
    Gain,
}

impl Register {
    /// Every register, in map order.
    pub const ALL: [Self; 3] = [Self::Delay, Self::Energy, Self::Gain];

    /// Page holding this word.
    #[must_use]
    pub const fn page(self) -> Page {
        match self {
            Self::Delay | Self::Energy => Page::Delay,
            Self::Gain => Page::Gain,
        }
    }

    /// Byte offset within its page.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::Delay => regs::DELAY_OFFSET,
            Self::Energy => regs::ENERGY_OFFSET,
            Self::Gain => regs::GAIN_OFFSET,
        }
    }

    /// Whether software may write this word.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Energy)
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delay => write!(f, "delay"),
            Self::Energy => write!(f, "energy"),
            Self::Gain => write!(f, "gain"),
        }
    }
}

/// A mapped register page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Delay / energy page.
    Delay,
    /// Gain page.
    Gain,
}

impl Page {
    /// Bytes of the page that must be mapped to reach its last word.
    #[must_use]
    pub fn required_len(self) -> usize {
        Register::ALL
            .iter()
            .filter(|r| r.page() == self)
            .map(|r| r.offset() + regs::WORD_BYTES)
            .max()
            .unwrap_or(regs::WORD_BYTES)
    }
}

/// Whole-word access to the feedback core's registers.
///
/// Implementations are synchronous and have no retry. Acquiring one may
/// fail; using one may not.
pub trait RegisterPort: Debug {
    /// Read a full register word.
    fn read_word(&self, register: Register) -> u32;

    /// Write a full register word.
    ///
    /// Writes to read-only words are dropped.
    fn write_word(&mut self, register: Register, word: u32);

    /// Backend type for diagnostics
    fn backend_type(&self) -> BackendType;
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Physical registers through `/dev/mem`
    DevMem,
    /// In-memory register file with a synthetic energy model
    Simulated,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DevMem => write!(f, "DevMem"),
            Self::Simulated => write!(f, "Simulated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_page_must_reach_energy_word() {
        assert_eq!(Page::Delay.required_len(), 12);
        assert_eq!(Page::Gain.required_len(), 4);
    }

    #[test]
    fn only_energy_is_read_only() {
        assert!(Register::Delay.is_writable());
        assert!(Register::Gain.is_writable());
        assert!(!Register::Energy.is_writable());
    }

    #[test]
    fn indices_are_dense() {
        for (i, r) in Register::ALL.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Register map of the feedback FPGA.
//!
//! The processing system sees the feedback core through two AXI GPIO pages.
//! Both are mapped from `/dev/mem` one system page at a time; every word the
//! software touches lives inside the first 12 bytes of its page.

// ── Physical pages ───────────────────────────────────────────────────────────

/// Physical base of the delay / energy page.
pub const DELAY_PAGE_ADDR: u64 = 0x4120_0000;

/// Physical base of the gain page.
pub const GAIN_PAGE_ADDR: u64 = 0x4200_0000;

// ── Word offsets ─────────────────────────────────────────────────────────────

/// Delay word, relative to [`DELAY_PAGE_ADDR`].
pub const DELAY_OFFSET: usize = 0x0;

/// Energy word, relative to [`DELAY_PAGE_ADDR`]. Read-only.
pub const ENERGY_OFFSET: usize = 0x8;

/// Gain word, relative to [`GAIN_PAGE_ADDR`].
pub const GAIN_OFFSET: usize = 0x0;

/// Width of every register word in bytes.
pub const WORD_BYTES: usize = 4;

// ── Field layout ─────────────────────────────────────────────────────────────

/// Mask of the low 16-bit field (delay, energy, k_p).
pub const LOW_FIELD_MASK: u32 = 0x0000_FFFF;

/// Shift of the high 16-bit field (k_d).
pub const HIGH_FIELD_SHIFT: u32 = 16;

// ── Parameter limits ─────────────────────────────────────────────────────────

/// Longest loop delay the core accepts, in FPGA clock cycles.
pub const DELAY_MAX: u16 = 500;

/// Largest gain magnitude, for both k_p and k_d. The range is symmetric.
pub const GAIN_MAX: i16 = 8191;

/// Full scale of the out-of-loop energy detector.
pub const ENERGY_MAX: u16 = u16::MAX;

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn words_fit_in_first_bytes_of_page() {
        assert!(ENERGY_OFFSET + WORD_BYTES <= 12);
        assert!(DELAY_OFFSET + WORD_BYTES <= ENERGY_OFFSET);
        assert_eq!(GAIN_OFFSET, 0);
    }

    #[test]
    fn pages_are_distinct() {
        assert_ne!(DELAY_PAGE_ADDR, GAIN_PAGE_ADDR);
        assert_eq!(DELAY_PAGE_ADDR % 0x1000, 0);
        assert_eq!(GAIN_PAGE_ADDR % 0x1000, 0);
    }
}

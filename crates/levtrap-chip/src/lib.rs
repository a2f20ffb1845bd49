// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the levitated-particle feedback FPGA.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of what the programmable logic exposes to the CPU: the two
//! mapped register pages, the bit layout of each word, the operating limits
//! of every parameter, and the saturating fixed-point codec that packs
//! engineering values into those words.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Physical page addresses, word offsets, field masks, limits |
//! | [`codec`] | Saturating encode / sign-extending decode of register words |
//!
//! # Register map
//!
//! ```text
//! Page            Offset  Bits     Field
//! ─────────────── ─────── ──────── ─────────────────────────────────────
//! 0x4120_0000     +0x0    [15:0]   delay cycles (unsigned, write)
//!                         [31:16]  reserved, written as zero
//! 0x4120_0000     +0x8    [15:0]   particle energy (unsigned, read-only)
//! 0x4200_0000     +0x0    [15:0]   k_p (two's complement)
//!                         [31:16]  k_d (two's complement)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod regs;

pub use codec::{
    decode_delay, decode_energy, decode_gain_pair, encode_delay, encode_delay_word, encode_gain,
    encode_gain_pair, GainPair,
};

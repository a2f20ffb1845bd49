// SPDX-License-Identifier: AGPL-3.0-only

//! Fixed-point codec between engineering values and register words.
//!
//! Every encoder saturates: an out-of-range request becomes the nearest
//! representable value and is never rejected. Decoders are total.

use crate::regs::{DELAY_MAX, GAIN_MAX, HIGH_FIELD_SHIFT, LOW_FIELD_MASK};

/// Proportional and derivative gain, as the feedback core holds them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GainPair {
    /// Proportional gain, low half of the gain word.
    pub k_p: i16,
    /// Derivative gain, high half of the gain word.
    pub k_d: i16,
}

impl GainPair {
    /// Both gains off.
    pub const ZERO: Self = Self { k_p: 0, k_d: 0 };

    /// Build a pair, saturating each gain to `±GAIN_MAX`.
    #[must_use]
    pub const fn saturating(k_p: i64, k_d: i64) -> Self {
        Self {
            k_p: encode_gain(k_p),
            k_d: encode_gain(k_d),
        }
    }

    /// Pack into the gain register word.
    #[must_use]
    pub const fn to_word(self) -> u32 {
        pack(self.k_p, self.k_d)
    }
}

impl std::fmt::Display for GainPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "k_p={} k_d={}", self.k_p, self.k_d)
    }
}

/// Saturate a delay request to `[0, DELAY_MAX]` clock cycles.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn encode_delay(value: i64) -> u16 {
    if value < 0 {
        0
    } else if value > DELAY_MAX as i64 {
        DELAY_MAX
    } else {
        value as u16
    }
}

/// Delay register word for a request: saturated field, reserved bits zero.
#[must_use]
pub const fn encode_delay_word(value: i64) -> u32 {
    encode_delay(value) as u32 & LOW_FIELD_MASK
}

/// Saturate a gain request to `[-GAIN_MAX, GAIN_MAX]`.
///
/// The result is the two's-complement content of the 16-bit field.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn encode_gain(value: i64) -> i16 {
    if value > GAIN_MAX as i64 {
        GAIN_MAX
    } else if value < -(GAIN_MAX as i64) {
        -GAIN_MAX
    } else {
        value as i16
    }
}

/// Gain register word for a pair of requests.
///
/// `(encode_gain(k_d) << 16) | (encode_gain(k_p) & 0xFFFF)`. Both gains go
/// out in one word; the register has no per-field write.
#[must_use]
pub const fn encode_gain_pair(k_p: i64, k_d: i64) -> u32 {
    pack(encode_gain(k_p), encode_gain(k_d))
}

/// Split a gain word into its sign-extended halves.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_gain_pair(word: u32) -> GainPair {
    GainPair {
        k_p: (word & LOW_FIELD_MASK) as u16 as i16,
        k_d: (word >> HIGH_FIELD_SHIFT) as u16 as i16,
    }
}

/// Delay cycles held in the low half of the delay word. Not sign-extended.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_delay(word: u32) -> u16 {
    (word & LOW_FIELD_MASK) as u16
}

/// Energy sample held in the low half of the energy word.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_energy(word: u32) -> u16 {
    (word & LOW_FIELD_MASK) as u16
}

#[allow(clippy::cast_sign_loss)]
const fn pack(k_p: i16, k_d: i16) -> u32 {
    ((k_d as u16 as u32) << HIGH_FIELD_SHIFT) | (k_p as u16 as u32 & LOW_FIELD_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn delay_saturates_at_both_ends() {
        assert_eq!(encode_delay(-5), 0);
        assert_eq!(encode_delay(i64::MIN), 0);
        assert_eq!(encode_delay(10_000), DELAY_MAX);
        assert_eq!(encode_delay(500), 500);
        assert_eq!(encode_delay(0), 0);
    }

    #[test]
    fn delay_word_leaves_reserved_bits_clear() {
        assert_eq!(encode_delay_word(1_000_000) & !LOW_FIELD_MASK, 0);
        assert_eq!(encode_delay_word(120), 120);
    }

    #[test]
    fn gain_saturates_symmetrically() {
        assert_eq!(encode_gain(9000), 8191);
        assert_eq!(encode_gain(-9000), -8191);
        assert_eq!(encode_gain(i64::MAX), 8191);
        assert_eq!(encode_gain(i64::MIN), -8191);
        assert_eq!(encode_gain(-8191), -8191);
    }

    #[test]
    fn gain_word_layout() {
        // k_d in the high half, k_p in the low half, two's complement
        assert_eq!(encode_gain_pair(1, -1), 0xFFFF_0001);
        assert_eq!(encode_gain_pair(-1, 0), 0x0000_FFFF);
        assert_eq!(encode_gain_pair(0, -5), 0xFFFB_0000);
        assert_eq!(encode_gain_pair(0, 0), 0);
    }

    #[test]
    fn negative_k_p_does_not_leak_into_k_d() {
        let pair = decode_gain_pair(encode_gain_pair(-8191, 17));
        assert_eq!(pair, GainPair { k_p: -8191, k_d: 17 });
    }

    #[test]
    fn decode_sign_extends_both_halves() {
        let pair = decode_gain_pair(0x8000_7FFF);
        assert_eq!(pair.k_p, i16::MAX);
        assert_eq!(pair.k_d, i16::MIN);
    }

    #[test]
    fn delay_and_energy_are_unsigned() {
        assert_eq!(decode_delay(0xABCD_FFFF), 0xFFFF);
        assert_eq!(decode_energy(0x0001_8000), 0x8000);
    }

    #[test]
    fn saturating_pair_matches_word_encoder() {
        let pair = GainPair::saturating(20_000, -3);
        assert_eq!(pair.to_word(), encode_gain_pair(20_000, -3));
        assert_eq!(pair.to_string(), "k_p=8191 k_d=-3");
    }

    proptest! {
        #[test]
        fn prop_delay_in_range(v in any::<i64>()) {
            let d = encode_delay(v);
            prop_assert!(d <= DELAY_MAX);
            if (0..=i64::from(DELAY_MAX)).contains(&v) {
                prop_assert_eq!(i64::from(d), v);
            }
        }

        #[test]
        fn prop_gain_in_range(v in any::<i64>()) {
            let g = encode_gain(v);
            prop_assert!((-GAIN_MAX..=GAIN_MAX).contains(&g));
            if (-i64::from(GAIN_MAX)..=i64::from(GAIN_MAX)).contains(&v) {
                prop_assert_eq!(i64::from(g), v);
            }
        }

        #[test]
        fn prop_gain_pair_survives_packing(
            k_p in -i64::from(GAIN_MAX)..=i64::from(GAIN_MAX),
            k_d in -i64::from(GAIN_MAX)..=i64::from(GAIN_MAX),
        ) {
            let pair = decode_gain_pair(encode_gain_pair(k_p, k_d));
            prop_assert_eq!(i64::from(pair.k_p), k_p);
            prop_assert_eq!(i64::from(pair.k_d), k_d);
        }
    }
}

//! Fixed-point conversions between on-chain integers and `Decimal`.
//!
//! Amounts travel as `U256` base units; prices and health factors are
//! `Decimal`. ABI-facing prices are WAD-scaled (18 decimals).

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::str::FromStr;

use crate::constants::BPS_DENOMINATOR;

// ---------------------------------------------------------------------------
// WAD (1e18): prices, health factors
// ---------------------------------------------------------------------------

/// WAD-scaled value (18 decimals).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wad(pub U256);

const WAD_SCALE: Decimal = dec!(1_000_000_000_000_000_000);

impl Wad {
    pub const ONE: Wad = Wad(U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]));
    pub const ZERO: Wad = Wad(U256::ZERO);

    /// Convert on-chain WAD (U256) to off-chain `Decimal`.
    ///
    /// Values beyond `Decimal`'s range saturate to `Decimal::MAX`.
    pub fn to_decimal(self) -> Decimal {
        let raw = Decimal::from_str(&self.0.to_string()).unwrap_or(Decimal::MAX);
        raw / WAD_SCALE
    }

    /// Scale a non-negative `Decimal` to WAD, truncating below 1e-18.
    ///
    /// Returns `None` for negative values or on overflow.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() {
            return None;
        }
        let scaled = value.checked_mul(WAD_SCALE)?.trunc();
        U256::from_str(&scaled.to_string()).ok().map(Self)
    }

    /// Inner `U256`.
    pub fn raw(self) -> U256 {
        self.0
    }
}

impl fmt::Debug for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wad({})", self.to_decimal())
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl From<U256> for Wad {
    fn from(val: U256) -> Self {
        Self(val)
    }
}

// ---------------------------------------------------------------------------
// Free-standing helpers
// ---------------------------------------------------------------------------

/// Price as WAD for ABI encoding. Unrepresentable prices encode as `U256::MAX`.
pub fn price_to_wad(price: Decimal) -> U256 {
    Wad::from_decimal(price).map(Wad::raw).unwrap_or(U256::MAX)
}

/// Convert a token amount in base units to whole-token `Decimal`.
///
/// `None` when the amount does not fit the 96-bit mantissa or `decimals`
/// exceeds 28.
pub fn units_to_decimal(amount: U256, decimals: u8) -> Option<Decimal> {
    let mut value = Decimal::from_str(&amount.to_string()).ok()?;
    value.set_scale(u32::from(decimals)).ok()?;
    Some(value)
}

/// `amount * bps / 10000`, rounded toward zero, without intermediate overflow.
///
/// Splits `amount = q * 10000 + r` so only `r * bps` needs to fit, which it
/// always does for `bps <= 10000`.
pub fn mul_bps(amount: U256, bps: u32) -> U256 {
    let denom = U256::from(BPS_DENOMINATOR);
    let bps = U256::from(bps);
    let q = amount / denom;
    let r = amount % denom;
    q * bps + (r * bps) / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wad_one_is_one() {
        assert_eq!(Wad::ONE.to_decimal(), dec!(1));
    }

    #[test]
    fn test_wad_zero() {
        assert_eq!(Wad::ZERO.to_decimal(), dec!(0));
    }

    #[test]
    fn test_wad_health_factor() {
        // 1.5e18 = health factor of 1.5
        let hf = Wad(U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(hf.to_decimal(), dec!(1.5));
    }

    #[test]
    fn test_price_to_wad() {
        assert_eq!(price_to_wad(dec!(2)), U256::from(2_000_000_000_000_000_000u128));
        assert_eq!(price_to_wad(dec!(0.5)), U256::from(500_000_000_000_000_000u128));
    }

    #[test]
    fn test_negative_price_is_unrepresentable() {
        assert!(Wad::from_decimal(dec!(-1)).is_none());
        assert_eq!(price_to_wad(dec!(-1)), U256::MAX);
    }

    #[test]
    fn test_units_to_decimal() {
        let hundred = U256::from(100_000_000_000_000_000_000u128);
        assert_eq!(units_to_decimal(hundred, 18), Some(dec!(100)));
        assert_eq!(units_to_decimal(U256::from(2_500_000u64), 6), Some(dec!(2.5)));
    }

    #[test]
    fn test_units_to_decimal_out_of_range_is_none() {
        assert_eq!(units_to_decimal(U256::MAX, 18), None);
        // 2^96 is one past the largest mantissa
        assert_eq!(units_to_decimal(U256::from(1u8) << 96, 18), None);
        assert_eq!(units_to_decimal(U256::from(1u8), 29), None);
    }

    #[test]
    fn test_mul_bps_reference_scenario() {
        // 100 tokens at 75% → 75 tokens
        let supplied = U256::from(100_000_000_000_000_000_000u128);
        assert_eq!(mul_bps(supplied, 7500), U256::from(75_000_000_000_000_000_000u128));
    }

    #[test]
    fn test_mul_bps_rounds_toward_zero() {
        assert_eq!(mul_bps(U256::from(3u64), 7500), U256::from(2u64));
        assert_eq!(mul_bps(U256::from(1u64), 9999), U256::ZERO);
    }

    #[test]
    fn test_mul_bps_no_overflow_at_max() {
        assert_eq!(mul_bps(U256::MAX, 10_000), U256::MAX);
    }

    proptest! {
        #[test]
        fn mul_bps_matches_naive_formula(amount in 0u128..u128::MAX / 10_000, bps in 0u32..=10_000u32) {
            let expected = U256::from(amount) * U256::from(bps) / U256::from(10_000u32);
            prop_assert_eq!(mul_bps(U256::from(amount), bps), expected);
        }
    }
}

//! Fixed-point price and amount utilities.
//!
//! ## Overview
//!
//! Flat prices and token amounts are integers carrying a fixed number of
//! fractional digits (`MarketConfig::price_decimals`, 6 by default). These
//! helpers convert between that representation and decimal strings for
//! the demo binary, logs and tests. The pricing path itself never touches
//! them.
//!
//! ## Examples
//!
//! ```
//! use casual_market::types::price::{from_fixed, to_fixed};
//!
//! // 0.5 at 6 decimals
//! let price = to_fixed("0.5", 6).unwrap();
//! assert_eq!(price, 500_000);
//!
//! assert_eq!(from_fixed(price, 6).unwrap(), "0.500000");
//! ```

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Largest number of fractional digits `rust_decimal` can carry.
pub const MAX_DECIMALS: u32 = 28;

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert a decimal string to a fixed-point integer with `decimals`
/// fractional digits.
///
/// Rounds half away from zero to the last representable digit. Returns
/// `None` on parse failure, negative input or overflow.
///
/// # Example
///
/// ```
/// use casual_market::types::price::to_fixed;
///
/// assert_eq!(to_fixed("1", 6), Some(1_000_000));
/// assert_eq!(to_fixed("0.0000015", 6), Some(2));
/// assert_eq!(to_fixed("-1", 6), None);
/// ```
pub fn to_fixed(s: &str, decimals: u32) -> Option<u128> {
    let decimal = Decimal::from_str(s).ok()?;
    decimal_to_fixed(decimal, decimals)
}

/// Convert a Decimal to a fixed-point integer.
pub fn decimal_to_fixed(d: Decimal, decimals: u32) -> Option<u128> {
    if d.is_sign_negative() || decimals > MAX_DECIMALS {
        return None;
    }

    let scale = Decimal::from_i128_with_scale(10i128.checked_pow(decimals)?, 0);
    let scaled = d.checked_mul(scale)?;
    let rounded = scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_u128()
}

/// Convert a fixed-point integer to a Decimal.
///
/// `None` when `value` does not fit the 96-bit Decimal mantissa.
pub fn fixed_to_decimal(value: u128, decimals: u32) -> Option<Decimal> {
    if decimals > MAX_DECIMALS {
        return None;
    }
    let mantissa = i128::try_from(value).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, decimals).ok()
}

/// Format a fixed-point integer with exactly `decimals` fractional digits.
///
/// # Example
///
/// ```
/// use casual_market::types::price::from_fixed;
///
/// assert_eq!(from_fixed(1_500_000, 6).unwrap(), "1.500000");
/// assert_eq!(from_fixed(7, 0).unwrap(), "7");
/// ```
pub fn from_fixed(value: u128, decimals: u32) -> Option<String> {
    let decimal = fixed_to_decimal(value, decimals)?;
    Some(format!("{:.*}", decimals as usize, decimal))
}

/// Format a fixed-point integer without trailing zeros.
///
/// # Example
///
/// ```
/// use casual_market::types::price::from_fixed_trimmed;
///
/// assert_eq!(from_fixed_trimmed(1_500_000, 6).unwrap(), "1.5");
/// assert_eq!(from_fixed_trimmed(2_000_000, 6).unwrap(), "2");
/// ```
pub fn from_fixed_trimmed(value: u128, decimals: u32) -> Option<String> {
    let decimal = fixed_to_decimal(value, decimals)?;
    Some(decimal.normalize().to_string())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed_basic() {
        assert_eq!(to_fixed("1.0", 6), Some(1_000_000));
        assert_eq!(to_fixed("0.5", 6), Some(500_000));
        assert_eq!(to_fixed("0.5", 3), Some(500));
        assert_eq!(to_fixed("500", 3), Some(500_000));
        assert_eq!(to_fixed("0.000001", 6), Some(1));
    }

    #[test]
    fn test_to_fixed_edge_cases() {
        assert_eq!(to_fixed("0", 6), Some(0));
        assert_eq!(to_fixed("-1.0", 6), None);
        assert_eq!(to_fixed("abc", 6), None);
        assert_eq!(to_fixed("", 6), None);
        assert_eq!(to_fixed("1", 29), None);
    }

    #[test]
    fn test_to_fixed_rounds() {
        assert_eq!(to_fixed("0.0000004", 6), Some(0));
        assert_eq!(to_fixed("0.0000005", 6), Some(1));
    }

    #[test]
    fn test_from_fixed() {
        assert_eq!(from_fixed(1_000_000, 6).unwrap(), "1.000000");
        assert_eq!(from_fixed(1, 6).unwrap(), "0.000001");
        assert_eq!(from_fixed(0, 3).unwrap(), "0.000");
        assert_eq!(from_fixed(u128::MAX, 6), None);
    }

    #[test]
    fn test_from_fixed_trimmed() {
        assert_eq!(from_fixed_trimmed(250_000, 6).unwrap(), "0.25");
        assert_eq!(from_fixed_trimmed(123_456_789, 6).unwrap(), "123.456789");
    }

    #[test]
    fn test_roundtrip() {
        for s in ["1", "0.5", "50000.123456", "0.000001"] {
            let fixed = to_fixed(s, 6).unwrap();
            let back = from_fixed_trimmed(fixed, 6).unwrap();
            assert_eq!(Decimal::from_str(s).unwrap(), Decimal::from_str(&back).unwrap(), "{}", s);
        }
    }
}

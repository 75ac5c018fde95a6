//! Fixed-point decimal amount used for every price, quantity, and balance.
//!
//! Exchange arithmetic must be exact: prices and quantities carry 8
//! fractional digits and are stored as 128-bit signed integers so that a
//! `price * quantity` notional never needs to round. Overflow is a fatal
//! invariant violation, never a silently saturating result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Number of fractional digits carried by every [`Amount`].
pub const SCALE_DIGITS: u32 = 8;

/// 10^8, the fixed-point scale factor.
pub const SCALE: i128 = 100_000_000;

/// Errors produced by checked [`Amount`] arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AmountError {
    /// The operation would overflow the underlying `i128`.
    Overflow,
    /// A decimal string could not be parsed into an `Amount`.
    InvalidDecimal,
    /// A negative amount was supplied where only non-negative values are valid.
    Negative,
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Overflow => write!(f, "fixed-point amount overflow"),
            AmountError::InvalidDecimal => write!(f, "invalid decimal string"),
            AmountError::Negative => write!(f, "amount must be non-negative"),
        }
    }
}

impl std::error::Error for AmountError {}

/// An exact fixed-point number with 8 fractional digits, stored as a
/// signed 128-bit integer (`value = units * 10^-8`).
///
/// All matching-engine and ledger arithmetic goes through `checked_*`
/// methods; there is no implicit rounding anywhere on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i128);

impl Amount {
    /// The additive identity.
    pub const ZERO: Amount = Amount(0);

    /// Construct an `Amount` from raw 10^-8 units (the wire/storage form).
    #[must_use]
    pub const fn from_raw(units: i128) -> Self {
        Amount(units)
    }

    /// Construct an `Amount` from an integer number of whole units.
    #[must_use]
    pub const fn from_integer(whole: i64) -> Self {
        Amount(whole as i128 * SCALE)
    }

    /// The raw 10^-8 integer representation.
    #[must_use]
    pub const fn raw(self) -> i128 {
        self.0
    }

    /// Parse a decimal string with up to 8 fractional digits (e.g. `"100.50"`).
    pub fn from_decimal_str(s: &str) -> Result<Self, AmountError> {
        let s = s.trim();
        let (sign, rest) = match s.strip_prefix('-') {
            Some(r) => (-1i128, r),
            None => (1i128, s.strip_prefix('+').unwrap_or(s)),
        };
        let mut parts = rest.splitn(2, '.');
        let int_part = parts.next().unwrap_or("0");
        let frac_part = parts.next().unwrap_or("");
        if frac_part.len() > SCALE_DIGITS as usize || !rest.chars().all(|c| c.is_ascii_digit() || c == '.')
        {
            return Err(AmountError::InvalidDecimal);
        }
        let int_val: i128 = int_part.parse().map_err(|_| AmountError::InvalidDecimal)?;
        let mut frac_digits = frac_part.to_string();
        while frac_digits.len() < SCALE_DIGITS as usize {
            frac_digits.push('0');
        }
        let frac_val: i128 = if frac_digits.is_empty() {
            0
        } else {
            frac_digits.parse().map_err(|_| AmountError::InvalidDecimal)?
        };
        let units = int_val
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac_val))
            .ok_or(AmountError::Overflow)?;
        Ok(Amount(sign * units))
    }

    /// `true` if the amount is strictly negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `true` if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition; `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction; `None` on overflow.
    #[must_use]
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Exact multiplication of a price-like amount by an integer quantity of
    /// raw units, rescaling back down to 8 fractional digits. `None` on
    /// overflow.
    #[must_use]
    pub fn checked_mul_qty(self, qty: Amount) -> Option<Amount> {
        let product = self.0.checked_mul(qty.0)?;
        Some(Amount(product / SCALE))
    }

    /// `true` if `self` is an exact multiple of `step` (tick/lot validation).
    #[must_use]
    pub fn is_multiple_of(self, step: Amount) -> bool {
        step.0 != 0 && self.0 % step.0 == 0
    }

    /// Returns the amount as `f64`, for display/analytics purposes only
    /// (never used in settlement arithmetic).
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        self.checked_add(rhs).expect("Amount addition overflow")
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        self.checked_sub(rhs).expect("Amount subtraction overflow")
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let int_part = abs / SCALE as u128;
        let frac_part = abs % SCALE as u128;
        write!(f, "{sign}{int_part}.{frac_part:08}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let a = Amount::from_decimal_str("100.50").unwrap();
        assert_eq!(a.to_string(), "100.50000000");
        assert_eq!(a.raw(), 100_50_000_000);
    }

    #[test]
    fn checked_mul_qty_is_exact() {
        let price = Amount::from_decimal_str("100.00").unwrap();
        let qty = Amount::from_decimal_str("2.00000000").unwrap();
        let notional = price.checked_mul_qty(qty).unwrap();
        assert_eq!(notional, Amount::from_decimal_str("200.00").unwrap());
    }

    #[test]
    fn tick_size_validation() {
        let tick = Amount::from_decimal_str("0.01").unwrap();
        let price = Amount::from_decimal_str("100.01").unwrap();
        let bad = Amount::from_decimal_str("100.015").unwrap_err();
        assert!(price.is_multiple_of(tick));
        assert_eq!(bad, AmountError::InvalidDecimal);
    }

    #[test]
    fn overflow_is_detected() {
        let max = Amount::from_raw(i128::MAX);
        assert!(max.checked_add(Amount::from_integer(1)).is_none());
    }
}

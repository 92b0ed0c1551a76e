//! # Money Module
//!
//! Provides the `Money` type for every amount the ledger touches.
//!
//! ## Why Fixed-Point Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A drawer that drifts by a fraction per movement never reconciles.     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (hundredths)                         │
//! │    "280000.50" CDF  →  28_000_050                                       │
//! │    "100" USD        →  10_000                                           │
//! │    Balances are sums of integers: exact, associative, SQL-friendly      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Money` carries no currency. Currency always travels next to it
//! (`(currency, Money)` pairs, or a `currency` column beside `amount_cents`),
//! because one register holds several per-currency balances.
//!
//! ## Usage
//! ```rust
//! use cambio_core::money::Money;
//!
//! let counted = Money::parse("125.00").unwrap();
//! let expected = Money::from_cents(12_000);
//! assert_eq!((counted - expected).to_string(), "5.00");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Number of fractional digits stored for every currency.
pub const MONEY_SCALE: u32 = 2;

/// Minor units per major unit (`10^MONEY_SCALE`).
const UNITS_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A signed monetary value in hundredths of the currency's major unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: movements are signed (cash in is positive, cash out
///   negative) and differences at close can be shortages
/// - **Single field tuple struct**: zero-cost over the `*_cents` columns
/// - **No currency inside**: callers pair it with a currency code
///
/// ## Where Money Flows
/// ```text
/// Opening count ──► SessionAmount.opening_cents
///                        │
/// Movement.amount ──► RegisterBalance.amount (relative SQL increment)
///                        │
/// Closing count ──► real − theoretical ──► SessionAmount.difference_cents
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use cambio_core::money::Money;
    ///
    /// let float = Money::from_cents(10_000); // 100.00
    /// assert_eq!(float.cents(), 10_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole major units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * UNITS_PER_MAJOR)
    }

    /// Parses a decimal string such as `"125"`, `"-30.5"` or `"280000.00"`.
    ///
    /// ## Rules
    /// - Must be a plain decimal number (no exponent, no thousands separators)
    /// - At most two fractional digits once trailing zeros are dropped
    /// - Must fit in the i64 minor-unit range
    ///
    /// ## Example
    /// ```rust
    /// use cambio_core::money::Money;
    ///
    /// assert_eq!(Money::parse("10.5").unwrap().cents(), 1050);
    /// assert_eq!(Money::parse("-0.25").unwrap().cents(), -25);
    /// assert!(Money::parse("ten").is_err());
    /// assert!(Money::parse("1.001").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Required {
                field: "amount".to_string(),
            });
        }

        let decimal = Decimal::from_str(trimmed).map_err(|_| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' is not a decimal number", trimmed),
        })?;

        Money::from_decimal(decimal)
    }

    /// Converts a `Decimal` into fixed-point minor units.
    ///
    /// Rejects values with more precision than [`MONEY_SCALE`] instead of
    /// silently rounding: a cashier's count is either exact or wrong.
    pub fn from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        if value.normalize().scale() > MONEY_SCALE {
            return Err(ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: format!("at most {} decimal places are allowed", MONEY_SCALE),
            });
        }

        let cents = value
            .checked_mul(Decimal::from(UNITS_PER_MAJOR))
            .and_then(|scaled| scaled.to_i64())
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: "amount is too large".to_string(),
            })?;

        Ok(Money(cents))
    }

    /// Returns the value as a `Decimal` with two fractional digits.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MONEY_SCALE)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / UNITS_PER_MAJOR
    }

    /// Returns the minor-unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % UNITS_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Addition that reports overflow instead of wrapping.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtraction that reports overflow instead of wrapping.
    #[inline]
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Formats the amount followed by its currency code, e.g. `"120.00 USD"`.
    pub fn format_with(&self, currency: &str) -> String {
        format!("{} {}", self, currency)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`"-5.50"`), no currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Negation flips the direction of a movement (used for reversals).
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents_and_parts() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);
        assert_eq!(Money::from_major(280_000).cents(), 28_000_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
        assert_eq!(Money::from_cents(12_000).format_with("USD"), "120.00 USD");
    }

    #[test]
    fn test_parse_accepts_plain_decimals() {
        assert_eq!(Money::parse("100").unwrap().cents(), 10_000);
        assert_eq!(Money::parse(" 12.3 ").unwrap().cents(), 1230);
        assert_eq!(Money::parse("-30.00").unwrap().cents(), -3000);
        assert_eq!(Money::parse("280000").unwrap().cents(), 28_000_000);
        // Trailing zeros beyond the scale are harmless.
        assert_eq!(Money::parse("1.2500").unwrap().cents(), 125);
    }

    #[test]
    fn test_parse_rejects_malformed_amounts() {
        assert!(matches!(
            Money::parse(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            Money::parse("12,50"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            Money::parse("abc"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            Money::parse("0.001"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(Money::parse("99999999999999999999999").is_err());
    }

    #[test]
    fn test_decimal_conversion_is_exact() {
        let money = Money::from_cents(-12_345);
        assert_eq!(money.to_decimal().to_string(), "-123.45");
        assert_eq!(Money::from_decimal(money.to_decimal()).unwrap(), money);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((-a).cents(), -1000);

        let mut c = a;
        c += b;
        c -= Money::from_cents(100);
        assert_eq!(c.cents(), 1400);
    }

    #[test]
    fn test_checked_arithmetic() {
        assert!(Money::from_cents(i64::MAX)
            .checked_add(Money::from_cents(1))
            .is_none());
        assert_eq!(
            Money::from_cents(5).checked_sub(Money::from_cents(7)),
            Some(Money::from_cents(-2))
        );
    }

    #[test]
    fn test_sum() {
        let movements = [
            Money::from_cents(10_000),
            Money::from_cents(5_000),
            Money::from_cents(-3_000),
        ];
        let total: Money = movements.iter().sum();
        assert_eq!(total.cents(), 12_000);
    }

    #[test]
    fn test_zero_and_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert_eq!(Money::from_cents(-550).abs().cents(), 550);
    }

    /// 0.1 + 0.2 must be exactly 0.3 in the ledger.
    #[test]
    fn test_no_float_drift() {
        let sum = Money::parse("0.1").unwrap() + Money::parse("0.2").unwrap();
        assert_eq!(sum, Money::parse("0.3").unwrap());
    }
}

//! # Money Module
//!
//! Provides the `Money` type for handling Brazilian Real amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Centavos                                         │
//! │    R$ 10,50  →  1050 centavos                                           │
//! │    Every sum, fee and total is exact integer math                      │
//! │                                                                         │
//! │  Floats appear only at provider boundaries that demand them            │
//! │  (Mercado Pago PIX `transaction_amount`).                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use comandas_core::money::Money;
//!
//! let cafe = Money::from_cents(650);          // R$ 6,50
//! let total = cafe * 2 + Money::from_cents(900);
//! assert_eq!(total.to_string(), "R$ 22,00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in centavos (1/100 of a Real).
///
/// ## Where Money is Used
/// ```text
/// Product.price_cents ──► OrderItem.unit_price ──► OrderItem.total
///                                                     │
///                               Order.total_amount ◄──┘
///                                     │
///                    Checkout.subtotal ──► + taxa − desconto ──► total
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from centavos.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from reais and centavos.
    ///
    /// ## Example
    /// ```rust
    /// use comandas_core::money::Money;
    ///
    /// assert_eq!(Money::from_reais(10, 50).cents(), 1050);
    /// assert_eq!(Money::from_reais(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_reais(reais: i64, centavos: i64) -> Self {
        if reais < 0 {
            Money(reais * 100 - centavos)
        } else {
            Money(reais * 100 + centavos)
        }
    }

    /// Returns the value in centavos.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-reais portion (truncated toward zero).
    #[inline]
    pub const fn reais(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the centavos portion (always 0-99).
    #[inline]
    pub const fn centavos_part(&self) -> i64 {
        (self.0 % 100).abs()
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

    /// Checks if the value is greater than zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is less than zero.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity, saturating at the i64 bounds.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Applies a percentage rate, rounding half away from zero to the centavo.
    ///
    /// ## Implementation
    /// Integer math in i128: `(amount * bps ± 5000) / 10000`
    ///
    /// ## Example
    /// ```rust
    /// use comandas_core::money::Money;
    /// use comandas_core::types::Rate;
    ///
    /// // R$ 100,00 at 2,99% = R$ 2,99
    /// let fee = Money::from_cents(10_000).apply_rate(Rate::from_bps(299));
    /// assert_eq!(fee.cents(), 299);
    ///
    /// // R$ 10,00 at 1,25% = 12,5 centavos → 13
    /// let fee = Money::from_cents(1_000).apply_rate(Rate::from_bps(125));
    /// assert_eq!(fee.cents(), 13);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = if product >= 0 {
            (product + 5_000) / 10_000
        } else {
            (product - 5_000) / 10_000
        };
        Money(rounded as i64)
    }

    /// Average of a total over `count` items, rounded half up.
    ///
    /// Returns zero when `count` is zero.
    pub fn average(total: Money, count: i64) -> Money {
        if count <= 0 {
            return Money::zero();
        }
        let total = total.0 as i128;
        let count = count as i128;
        Money(((total * 2 + count) / (count * 2)) as i64)
    }

    /// Parses a Brazilian-formatted amount.
    ///
    /// ## Accepted Input
    /// ```text
    /// "R$ 1.234,56"  → 123456     "." is a thousands separator
    /// "50"           → 5000       "," is the decimal separator
    /// "12,5"         → 1250       at most 2 decimal places
    /// "-3,00"        → -300       sign is kept; callers enforce > 0
    /// ```
    ///
    /// ## Returns
    /// * `Some(Money)` - Parsed value
    /// * `None` - Empty or malformed input
    pub fn parse_brl(input: &str) -> Option<Money> {
        let cleaned = input.replace("R$", "");
        let cleaned = cleaned.trim().replace('.', "").replace(',', ".");

        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest.trim()),
            None => (false, cleaned.as_str()),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if fraction.len() > 2 || fraction.contains('.') {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };

        let cents = whole.checked_mul(100)?.checked_add(fraction)?;
        Some(Money(if negative { -cents } else { cents }))
    }

    /// Returns the value as a plain decimal string ("1234.56").
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.reais().abs(), self.centavos_part())
    }

    /// Returns the value in reais as a float.
    ///
    /// ## Note
    /// Only for provider payloads that require a JSON number in reais.
    pub fn to_reais_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Formats as Brazilian Real: `R$ 1.234,56`, negatives as `-R$ 5,50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let reais = self.reais().abs().to_string();

        let mut grouped = String::with_capacity(reais.len() + reais.len() / 3);
        for (i, ch) in reais.chars().enumerate() {
            if i > 0 && (reais.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        write!(f, "{}R$ {},{:02}", sign, grouped, self.centavos_part())
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
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.reais(), 10);
        assert_eq!(money.centavos_part(), 99);
    }

    #[test]
    fn test_display_brl() {
        assert_eq!(Money::from_cents(123456).to_string(), "R$ 1.234,56");
        assert_eq!(Money::from_cents(5000).to_string(), "R$ 50,00");
        assert_eq!(Money::from_cents(5).to_string(), "R$ 0,05");
        assert_eq!(Money::from_cents(-550).to_string(), "-R$ 5,50");
        assert_eq!(Money::from_cents(123456789).to_string(), "R$ 1.234.567,89");
        assert_eq!(Money::from_cents(100000).to_string(), "R$ 1.000,00");
    }

    #[test]
    fn test_parse_brl() {
        assert_eq!(Money::parse_brl("R$ 1.234,56"), Some(Money::from_cents(123456)));
        assert_eq!(Money::parse_brl("50"), Some(Money::from_cents(5000)));
        assert_eq!(Money::parse_brl("  12,5 "), Some(Money::from_cents(1250)));
        assert_eq!(Money::parse_brl(",99"), Some(Money::from_cents(99)));
        assert_eq!(Money::parse_brl("-3,00"), Some(Money::from_cents(-300)));
    }

    #[test]
    fn test_parse_brl_treats_dot_as_thousands() {
        // "12.50" is twelve hundred and fifty reais in pt-BR notation
        assert_eq!(Money::parse_brl("12.50"), Some(Money::from_cents(125000)));
    }

    #[test]
    fn test_parse_brl_rejects_garbage() {
        assert_eq!(Money::parse_brl(""), None);
        assert_eq!(Money::parse_brl("R$"), None);
        assert_eq!(Money::parse_brl("abc"), None);
        assert_eq!(Money::parse_brl("1,234"), None);
        assert_eq!(Money::parse_brl("1,2,3"), None);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_apply_rate_rounds_half_up() {
        let amount = Money::from_cents(1000);
        assert_eq!(amount.apply_rate(Rate::from_bps(125)).cents(), 13);
        assert_eq!(amount.apply_rate(Rate::from_bps(0)).cents(), 0);
        assert_eq!(amount.apply_rate(Rate::from_bps(10_000)).cents(), 1000);
    }

    #[test]
    fn test_average() {
        assert_eq!(Money::average(Money::from_cents(1000), 3).cents(), 333);
        assert_eq!(Money::average(Money::from_cents(1001), 2).cents(), 501);
        assert_eq!(Money::average(Money::from_cents(1000), 0).cents(), 0);
    }

    #[test]
    fn test_decimal_string() {
        assert_eq!(Money::from_cents(123456).to_decimal_string(), "1234.56");
        assert_eq!(Money::from_cents(-5).to_decimal_string(), "-0.05");
        assert!((Money::from_cents(1050).to_reais_f64() - 10.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_arithmetic_never_overflows() {
        let huge = Money::from_cents(4_000_000_000_000_000_000);
        assert_eq!(huge.checked_multiply_quantity(3), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);
        assert_eq!(huge.checked_multiply_quantity(2).map(|m| m.cents()), Some(8_000_000_000_000_000_000));

        assert_eq!(huge.multiply_quantity(3).cents(), i64::MAX);
        assert_eq!((huge + huge).cents(), i64::MAX);
        assert_eq!((Money::from_cents(i64::MIN) - Money::from_cents(1)).cents(), i64::MIN);
    }
}

//! Fixed-point money in minor units.
//!
//! Amounts are stored as an `i64` count of cents and never as floating point
//! or free-form decimals. Conversion to and from [`Decimal`] happens only at
//! the JSON boundary, where amounts travel as strings such as `"59.97"`.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of decimal places carried by every amount.
pub const MINOR_DIGITS: u32 = 2;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount has more than {MINOR_DIGITS} decimal places")]
    TooPrecise,
    #[error("amount is out of range")]
    OutOfRange,
    #[error("amount is not a number: {0}")]
    NotANumber(String),
}

/// An amount of money in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Convert a decimal amount, rejecting sub-cent precision instead of
    /// rounding it away.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::TooPrecise`] for more than two decimal places and
    /// [`MoneyError::OutOfRange`] if the amount does not fit in `i64` cents.
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        let scaled = amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(MoneyError::OutOfRange)?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::TooPrecise);
        }
        scaled.to_i64().map(Self).ok_or(MoneyError::OutOfRange)
    }

    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_DIGITS)
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Unit price times quantity. Saturates instead of wrapping.
    #[must_use]
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as i64))
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.to_decimal())
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let amount =
            Decimal::from_str(trimmed).map_err(|_| MoneyError::NotANumber(trimmed.to_owned()))?;
        Self::from_decimal(amount)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.to_decimal())
    }
}

/// Accepts `"19.99"`, `19.99` or `19`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawAmount::deserialize(deserializer)? {
            RawAmount::Integer(whole) => Decimal::from(whole)
                .checked_mul(Decimal::ONE_HUNDRED)
                .and_then(|d| d.to_i64())
                .map(Self)
                .ok_or(MoneyError::OutOfRange),
            RawAmount::Float(value) => value.to_string().parse(),
            RawAmount::Text(text) => text.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value).map(Self)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_strings() {
        assert_eq!("59.97".parse::<Money>().unwrap(), Money::from_minor(5997));
        assert_eq!("12".parse::<Money>().unwrap(), Money::from_minor(1200));
        assert_eq!("0.5".parse::<Money>().unwrap(), Money::from_minor(50));
    }

    #[test]
    fn test_rejects_sub_cent_precision() {
        assert_eq!("1.999".parse::<Money>(), Err(MoneyError::TooPrecise));
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert!(matches!(
            "$12".parse::<Money>(),
            Err(MoneyError::NotANumber(_))
        ));
    }

    #[test]
    fn test_times_and_sum() {
        let unit = Money::from_minor(1999);
        assert_eq!(unit.times(3), Money::from_minor(5997));
        let total: Money = [unit, Money::from_minor(1)].into_iter().sum();
        assert_eq!(total, Money::from_minor(2000));
    }

    #[test]
    fn test_times_saturates() {
        assert_eq!(Money::from_minor(i64::MAX).times(2).minor(), i64::MAX);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(5).to_string(), "$0.05");
        assert_eq!(Money::from_minor(129_900).to_string(), "$1299.00");
    }

    #[test]
    fn test_json_shapes() {
        assert_eq!(
            serde_json::to_string(&Money::from_minor(5997)).unwrap(),
            "\"59.97\""
        );
        let from_text: Money = serde_json::from_str("\"19.99\"").unwrap();
        let from_float: Money = serde_json::from_str("19.99").unwrap();
        let from_int: Money = serde_json::from_str("19").unwrap();
        assert_eq!(from_text, Money::from_minor(1999));
        assert_eq!(from_float, Money::from_minor(1999));
        assert_eq!(from_int, Money::from_minor(1900));
        assert!(serde_json::from_str::<Money>("\"0.001\"").is_err());
    }
}

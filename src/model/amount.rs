//! Amount type for handling monetary values reported by the card system.
//!
//! The trade list reports amounts as JSON numbers, but strings with a yuan sign or thousands
//! separators show up in hand-edited data, so both are accepted.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// The sign used when displaying amounts.
const YUAN: char = '¥';

/// The full-width sign that some exports use.
const FULL_WIDTH_YUAN: char = '￥';

/// Represents an amount of money in yuan.
///
/// Negative values are debits. Aggregation works with `abs()`.
///
/// ```
/// # use campus_card_stats::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("-¥1,200.50").unwrap();
/// assert_eq!(amount.to_string(), "-¥1,200.50");
/// assert_eq!(amount.abs().to_string(), "¥1,200.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Parses the raw `txamt` value of a trade record, which may be a number or a string.
    pub fn from_json(value: &Value) -> Result<Self, AmountError> {
        match value {
            Value::Number(n) => {
                let s = n.to_string();
                Decimal::from_str(&s)
                    .or_else(|_| Decimal::from_scientific(&s))
                    .map(Amount)
                    .map_err(AmountError::Decimal)
            }
            Value::String(s) => Amount::from_str(s),
            other => Err(AmountError::NotANumber(other.to_string())),
        }
    }
}

/// An error that can occur when parsing amounts.
pub enum AmountError {
    Decimal(rust_decimal::Error),
    NotANumber(String),
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Decimal(e) => Debug::fmt(e, f),
            AmountError::NotANumber(s) => write!(f, "NotANumber({s})"),
        }
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Decimal(e) => Display::fmt(e, f),
            AmountError::NotANumber(s) => write!(f, "expected a number, found {s}"),
        }
    }
}

impl Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AmountError::Decimal(e) => Some(e),
            AmountError::NotANumber(_) => None,
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::NotANumber(String::from("an empty string")));
        }

        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let unsigned = unsigned
            .trim_start_matches(|c: char| c == YUAN || c == FULL_WIDTH_YUAN)
            .replace(',', "");

        let value = Decimal::from_str(&unsigned).map_err(AmountError::Decimal)?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let num = self.0.abs().round_dp(2);
        write!(
            f,
            "{sign}{YUAN}{}",
            format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
        )
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Amount::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

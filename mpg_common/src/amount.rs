use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

/// The currency used when a payment request does not specify one.
pub const DEFAULT_CURRENCY: &str = "ZMW";

const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------       Amount        ---------------------------------------------------------
/// A monetary amount, stored in the minor units of its currency (e.g. ngwee for ZMW). 5000 ngwee is 50.00 ZMW.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Amount(i64);

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_major = MINOR_UNITS_PER_MAJOR as u64;
        write!(f, "{sign}{}.{:02}", abs / per_major, abs % per_major)
    }
}

impl FromStr for Amount {
    type Err = AmountConversionError;

    /// Parses an amount given in major units, such as `"50"`, `"50.5"` or `"50.25"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_major_str(s)
    }
}

impl Amount {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * MINOR_UNITS_PER_MAJOR)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The amount in major units, without a currency symbol. Provider APIs expect amounts in this form.
    pub fn to_major_string(&self) -> String {
        self.to_string()
    }

    pub fn from_major_str(s: &str) -> Result<Self, AmountConversionError> {
        let s = s.trim();
        let err = || AmountConversionError(s.to_string());
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse::<i64>().map_err(|_| err())?,
        };
        let minor = whole.checked_mul(MINOR_UNITS_PER_MAJOR).and_then(|w| w.checked_add(frac)).ok_or_else(err)?;
        Ok(Self(if negative { -minor } else { minor }))
    }
}

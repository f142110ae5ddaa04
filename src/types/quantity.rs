// ABOUTME: Replica quantities expressed as an absolute count or a percentage.
// ABOUTME: Used for surge, unavailable, and minimum-available budgets.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("quantity cannot be empty")]
    Empty,

    #[error("quantity cannot be negative: {0}")]
    Negative(String),

    #[error("invalid quantity '{0}' (expected an integer like 2 or a percentage like 25%)")]
    Invalid(String),
}

/// How a percentage is turned into a whole number of replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Up,
    Down,
}

/// A non-negative replica count, either fixed or relative to the desired count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Absolute(u32),
    Percent(u32),
}

impl Quantity {
    /// Resolve against `total` replicas.
    pub fn resolve(&self, total: u32, rounding: Rounding) -> u32 {
        match *self {
            Quantity::Absolute(n) => n,
            Quantity::Percent(p) => {
                let scaled = u64::from(total) * u64::from(p);
                let value = match rounding {
                    Rounding::Up => scaled.div_ceil(100),
                    Rounding::Down => scaled / 100,
                };
                u32::try_from(value).unwrap_or(u32::MAX)
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Quantity::Absolute(0) | Quantity::Percent(0))
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }
        if s.starts_with('-') {
            return Err(QuantityError::Negative(s.to_string()));
        }
        let invalid = || QuantityError::Invalid(s.to_string());
        match s.strip_suffix('%') {
            Some(pct) => pct.trim().parse().map(Quantity::Percent).map_err(|_| invalid()),
            None => s.parse().map(Quantity::Absolute).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Absolute(n) => write!(f, "{n}"),
            Quantity::Percent(p) => write!(f, "{p}%"),
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Quantity::Absolute(n) => serializer.serialize_u32(*n),
            Quantity::Percent(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(n) if n < 0 => Err(serde::de::Error::custom(QuantityError::Negative(
                n.to_string(),
            ))),
            Raw::Int(n) => u32::try_from(n)
                .map(Quantity::Absolute)
                .map_err(|_| serde::de::Error::custom(QuantityError::Invalid(n.to_string()))),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

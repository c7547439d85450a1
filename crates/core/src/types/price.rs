//! Prices in integer minor units.
//!
//! The catalog stores every amount as an `i64` count of the currency's
//! smallest unit (cents for USD). Decimal arithmetic is only needed at the
//! edges, when a shopper types `19.99` into a price filter.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minor units per major unit.
const MINOR_UNITS: i64 = 100;

/// Errors from parsing a decimal price string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("not a decimal amount: {0}")]
    Invalid(String),
    #[error("amount must not be negative")]
    Negative,
    #[error("amount out of range")]
    Overflow,
}

/// An amount in minor currency units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Wrap an amount already expressed in minor units.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Convert a major-unit decimal (e.g. `19.99`) to minor units.
    ///
    /// Fractions of a minor unit are rounded half away from zero.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for amounts below zero and
    /// `PriceError::Overflow` if the result does not fit in an `i64`.
    pub fn from_decimal(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        let minor = amount
            .checked_mul(Decimal::from(MINOR_UNITS))
            .ok_or(PriceError::Overflow)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        minor.to_i64().map(Self).ok_or(PriceError::Overflow)
    }

    /// The amount as a major-unit decimal with two fractional digits.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let amount =
            Decimal::from_str(trimmed).map_err(|_| PriceError::Invalid(trimmed.to_string()))?;
        Self::from_decimal(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_decimal())
    }
}

impl From<i64> for Price {
    fn from(minor: i64) -> Self {
        Self(minor)
    }
}

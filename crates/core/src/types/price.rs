//! Type-safe price representation using decimal arithmetic.
//!
//! Catalog records carry their price as an opaque passthrough attribute, either
//! a JSON number (`179.9`) or a decimal string (`"179.90"`). [`Price`] parses
//! both into a [`Decimal`] so line totals never go through floating point.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when parsing a price attribute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The attribute is not a number or a numeric string.
    #[error("price must be a number or numeric string, got {0}")]
    NotNumeric(String),

    /// The value cannot be represented as a decimal.
    #[error("price out of range: {0}")]
    OutOfRange(String),

    /// Prices cannot be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., reais, not centavos).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Parse a price from a JSON attribute in the default currency.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not numeric, cannot be represented as
    /// a decimal, or is negative.
    pub fn from_json(value: &Value) -> Result<Self, PriceError> {
        let amount = match value {
            Value::Number(n) => n
                .to_string()
                .parse::<Decimal>()
                .or_else(|_| {
                    n.as_f64()
                        .ok_or_else(|| PriceError::OutOfRange(n.to_string()))
                        .and_then(|f| {
                            Decimal::try_from(f).map_err(|e| PriceError::OutOfRange(e.to_string()))
                        })
                })?,
            Value::String(s) => s
                .trim()
                .parse::<Decimal>()
                .map_err(|_| PriceError::NotNumeric(s.clone()))?,
            other => return Err(PriceError::NotNumeric(other.to_string())),
        };

        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }

        Ok(Self::new(amount, CurrencyCode::default()))
    }

    /// Multiply the unit price by a quantity.
    ///
    /// Returns `None` if the result does not fit in a `Decimal`.
    #[must_use]
    pub fn times(self, quantity: u32) -> Option<Self> {
        self.amount
            .checked_mul(Decimal::from(quantity))
            .map(|amount| Self::new(amount, self.currency_code))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[allow(clippy::upper_case_acronyms)]
pub enum CurrencyCode {
    #[default]
    BRL,
    USD,
    EUR,
}

impl CurrencyCode {
    /// Display symbol used when formatting prices.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::BRL => "R$ ",
            Self::USD => "$",
            Self::EUR => "€",
        }
    }
}

//! Supported currencies and money rounding.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::PaymentError;
use super::settlement::AMOUNT_LIMIT;

/// The two currencies every amount is stored in.
///
/// Rates are quoted as domestic units per one foreign unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Costa Rican colón.
    #[serde(rename = "CRC")]
    Domestic,
    /// United States dollar.
    #[serde(rename = "USD")]
    Foreign,
}

impl Currency {
    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Domestic => "CRC",
            Currency::Foreign => "USD",
        }
    }

    /// The other supported currency.
    pub fn counterpart(&self) -> Currency {
        match self {
            Currency::Domestic => Currency::Foreign,
            Currency::Foreign => Currency::Domestic,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRC" => Ok(Currency::Domestic),
            "USD" => Ok(Currency::Foreign),
            _ => Err(PaymentError::InvalidCurrency(s.to_string())),
        }
    }
}

/// Rounds a money amount to two decimal places, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts `amount` between the supported currencies at `rate`.
///
/// Identity when both sides match. Overflow or a zero rate is
/// `InvalidAmount`.
pub fn convert_at(
    amount: Decimal,
    from: Currency,
    to: Currency,
    rate: Decimal,
) -> Result<Decimal, PaymentError> {
    let converted = match (from, to) {
        (a, b) if a == b => return Ok(amount),
        (Currency::Foreign, Currency::Domestic) => amount.checked_mul(rate),
        _ => amount.checked_div(rate),
    };
    converted
        .map(round_money)
        .ok_or(PaymentError::InvalidAmount(amount))
}

/// An amount expressed in both currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAmounts {
    pub domestic: Decimal,
    pub foreign: Decimal,
}

impl CurrencyAmounts {
    /// Keeps `amount` untouched in its own slot and converts only the other.
    ///
    /// Fails with `InvalidAmount` when either slot would not fit in storage.
    pub fn from_original(
        amount: Decimal,
        currency: Currency,
        rate: Decimal,
    ) -> Result<Self, PaymentError> {
        let converted = convert_at(amount, currency, currency.counterpart(), rate)?;
        if amount.abs() >= AMOUNT_LIMIT || converted.abs() >= AMOUNT_LIMIT {
            return Err(PaymentError::InvalidAmount(amount));
        }
        Ok(match currency {
            Currency::Domestic => Self {
                domestic: amount,
                foreign: converted,
            },
            Currency::Foreign => Self {
                domestic: converted,
                foreign: amount,
            },
        })
    }

    /// The slot matching `currency`.
    pub fn in_currency(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Domestic => self.domestic,
            Currency::Foreign => self.foreign,
        }
    }
}

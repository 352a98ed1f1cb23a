//! Payment methods.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Wallet,
    Cash,
    BankTransfer,
    Other,
}

impl PaymentMethod {
    /// Methods offered to customers. `Other` is accepted but not offered.
    pub const SELECTABLE: [PaymentMethod; 4] = [
        PaymentMethod::Card,
        PaymentMethod::Wallet,
        PaymentMethod::Cash,
        PaymentMethod::BankTransfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Credit or debit card",
            PaymentMethod::Wallet => "Online wallet",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::BankTransfer => "Bank transfer",
            PaymentMethod::Other => "Other",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "wallet" => Ok(PaymentMethod::Wallet),
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(format!("unknown payment method: {}", s)),
        }
    }
}

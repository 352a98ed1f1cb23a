//! Stripe wire types: signature header, event envelope and API objects.
//!
//! Only the fields settlement reads are modelled; everything else in
//! Stripe's JSON is ignored.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::domain::payment::Currency;
use crate::ports::IntentStatus;

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    MissingHeader,
    MissingTimestamp,
    MissingV1Signature,
    InvalidTimestamp,
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`.
///
/// Stripe sends several `v1` entries while a signing secret is rolled;
/// any one of them matching is enough.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    let bytes = hex::decode(value.trim())
                        .map_err(|_| SignatureParseError::InvalidSignatureFormat)?;
                    v1_signatures.push(bytes);
                }
                // v0 and unknown schemes are ignored.
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Events
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub livemode: bool,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// API Objects
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub last_payment_error: Option<StripeApiErrorDetail>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripePaymentIntent {
    /// Maps Stripe's intent lifecycle onto the provider-neutral status.
    pub fn intent_status(&self) -> IntentStatus {
        match self.status.as_str() {
            "succeeded" => IntentStatus::Succeeded,
            "canceled" => IntentStatus::Canceled,
            // Back to requires_payment_method after a declined attempt.
            "requires_payment_method" if self.last_payment_error.is_some() => IntentStatus::Failed,
            _ => IntentStatus::Pending,
        }
    }

    /// Record reference attached as `metadata[reference]` at creation.
    pub fn client_reference(&self) -> Option<String> {
        self.metadata.get("reference").cloned()
    }

    pub fn failure_message(&self) -> Option<String> {
        self.last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.code.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiErrorDetail {
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Amounts
// ════════════════════════════════════════════════════════════════════════════════

/// Currencies Stripe charges in whole units.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

fn is_zero_decimal(currency: Currency) -> bool {
    ZERO_DECIMAL_CURRENCIES.contains(&currency.code())
}

/// Converts a major-unit amount to Stripe's integer minor units.
///
/// `None` when the scaled amount does not fit.
pub fn to_minor_units(amount: Decimal, currency: Currency) -> Option<i64> {
    let scaled = if is_zero_decimal(currency) {
        amount
    } else {
        amount.checked_mul(Decimal::ONE_HUNDRED)?
    };
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_valid_header() {
        let header = SignatureHeader::parse("t=1704067200,v1=abcdef0123456789").unwrap();
        assert_eq!(header.timestamp, 1704067200);
        assert_eq!(
            header.v1_signatures,
            vec![vec![0xab, 0xcd, 0xef, 0x01, 0x23, 0x45, 0x67, 0x89]]
        );
    }

    #[test]
    fn parse_header_keeps_every_v1_and_skips_v0() {
        let header = SignatureHeader::parse("t=1,v1=aa,v0=bb,v1=cc").unwrap();
        assert_eq!(header.v1_signatures, vec![vec![0xaa], vec![0xcc]]);
    }

    #[test]
    fn parse_header_errors() {
        assert_eq!(
            SignatureHeader::parse("").unwrap_err(),
            SignatureParseError::MissingHeader
        );
        assert_eq!(
            SignatureHeader::parse("v1=abcd").unwrap_err(),
            SignatureParseError::MissingTimestamp
        );
        assert_eq!(
            SignatureHeader::parse("t=123").unwrap_err(),
            SignatureParseError::MissingV1Signature
        );
        assert_eq!(
            SignatureHeader::parse("t=soon,v1=abcd").unwrap_err(),
            SignatureParseError::InvalidTimestamp
        );
        assert_eq!(
            SignatureHeader::parse("t=123,v1=xyz").unwrap_err(),
            SignatureParseError::InvalidSignatureFormat
        );
    }

    #[test]
    fn minor_units_scale_two_decimal_currencies() {
        assert_eq!(to_minor_units(dec!(100.00), Currency::Domestic), Some(10000));
        assert_eq!(to_minor_units(dec!(19.99), Currency::Foreign), Some(1999));
        assert_eq!(to_minor_units(dec!(0.005), Currency::Foreign), Some(1));
    }

    #[test]
    fn minor_units_overflow_is_none() {
        assert_eq!(to_minor_units(Decimal::MAX, Currency::Foreign), None);
        assert_eq!(to_minor_units(Decimal::MIN, Currency::Domestic), None);
    }

    #[test]
    fn client_reference_comes_from_metadata() {
        let intent: StripePaymentIntent = serde_json::from_str(
            r#"{"id":"pi_1","status":"succeeded","client_secret":null,"last_payment_error":null,"metadata":{"reference":"REF-7","idempotency_key":"payment-7"}}"#,
        )
        .unwrap();
        assert_eq!(intent.client_reference().as_deref(), Some("REF-7"));

        let bare: StripePaymentIntent =
            serde_json::from_str(r#"{"id":"pi_2","status":"succeeded"}"#).unwrap();
        assert_eq!(bare.client_reference(), None);
    }

    #[test]
    fn intent_status_mapping() {
        let intent = |status: &str, failed: bool| StripePaymentIntent {
            id: "pi_1".into(),
            status: status.into(),
            client_secret: None,
            last_payment_error: failed.then(|| StripeApiErrorDetail {
                message: Some("Your card was declined.".into()),
                code: Some("card_declined".into()),
                error_type: Some("card_error".into()),
            }),
            metadata: HashMap::new(),
        };

        assert_eq!(intent("succeeded", false).intent_status(), IntentStatus::Succeeded);
        assert_eq!(intent("canceled", false).intent_status(), IntentStatus::Canceled);
        assert_eq!(intent("processing", false).intent_status(), IntentStatus::Pending);
        assert_eq!(
            intent("requires_payment_method", false).intent_status(),
            IntentStatus::Pending
        );
        let declined = intent("requires_payment_method", true);
        assert_eq!(declined.intent_status(), IntentStatus::Failed);
        assert_eq!(
            declined.failure_message().as_deref(),
            Some("Your card was declined.")
        );
    }
}

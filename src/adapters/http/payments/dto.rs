//! HTTP DTOs for payment, donation and webhook endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::payment::{Donation, PaymentMethod, PaymentRecord, PaymentStatus, Settleable};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    pub currency: String,
    /// Defaults to `card`.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Present for enrollment payments.
    #[serde(default)]
    pub enrollment_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub receipt_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDonationRequest {
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub donor_email: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundPaymentRequest {
    /// Full refund when absent.
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForceFailRequest {
    pub operator: String,
    #[serde(default)]
    pub reason: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub kind: String,
    pub enrollment_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub amount_domestic: Decimal,
    pub amount_foreign: Decimal,
    pub method: PaymentMethod,
    pub provider_reference: String,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub receipt_ref: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PaymentRecord> for PaymentResponse {
    fn from(p: PaymentRecord) -> Self {
        let enrollment_id = p.enrollment_id().map(|e| e.to_string());
        Self {
            id: p.id.to_string(),
            kind: if enrollment_id.is_some() { "enrollment" } else { "general" }.to_string(),
            enrollment_id,
            amount: p.amount,
            currency: p.currency.code().to_string(),
            amount_domestic: p.amount_domestic,
            amount_foreign: p.amount_foreign,
            method: p.method,
            provider_reference: p.provider_reference,
            status: p.status,
            notes: p.notes,
            receipt_ref: p.receipt_ref,
            created_at: p.created_at.as_datetime().to_rfc3339(),
            updated_at: p.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationResponse {
    pub id: String,
    pub donor_name: String,
    pub donor_email: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub amount_domestic: Decimal,
    pub amount_foreign: Decimal,
    pub method: PaymentMethod,
    pub provider_reference: Option<String>,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Donation> for DonationResponse {
    fn from(d: Donation) -> Self {
        Self {
            id: d.id.to_string(),
            donor_name: d.donor_display_name().to_string(),
            donor_email: d.donor.as_ref().map(|donor| donor.email.clone()),
            amount: d.amount,
            currency: d.currency.code().to_string(),
            amount_domestic: d.amount_domestic,
            amount_foreign: d.amount_foreign,
            method: d.method,
            provider_reference: d.provider_reference,
            status: d.status,
            notes: d.notes,
            created_at: d.created_at.as_datetime().to_rfc3339(),
            updated_at: d.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Processed record plus the provider's client handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse<R> {
    pub record: R,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResponse {
    pub payment: PaymentResponse,
    pub refund_id: String,
    pub refund_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodResponse {
    pub value: PaymentMethod,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

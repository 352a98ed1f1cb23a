//! Provider gateway port for moving money.
//!
//! Defines the contract every payment provider integration fulfils
//! (Stripe-like card intents, PayPal-like orders). Gateways are pure
//! adapters over a remote API: they never touch local records.
//!
//! # Design
//!
//! - **Provider agnostic**: callers never branch on which provider is in use
//! - **Idempotent**: every mutating call carries an idempotency key, so a
//!   re-issued call returns the original transaction instead of a new one
//! - **Definite vs ambiguous**: errors say whether the provider may have
//!   acted, which decides between FAILED and leaving a record PROCESSING

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::payment::{Currency, PaymentError, PaymentStatus};

/// Port for payment provider integrations.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Short provider name used in errors, logs and audit actors.
    fn provider(&self) -> &'static str;

    /// Create a provider-side transaction for `request.amount`.
    async fn create_intent(&self, request: IntentRequest) -> Result<ProviderIntent, GatewayError>;

    /// Retrieve the current state of a provider transaction.
    async fn confirm(&self, external_id: &str) -> Result<ProviderIntent, GatewayError>;

    /// Refund a settled transaction, fully when `amount` is `None`.
    async fn refund(&self, request: RefundRequest) -> Result<ProviderRefund, GatewayError>;
}

/// Request to create a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Major-unit amount. Gateways convert to their own minor-unit convention.
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,
    pub idempotency_key: String,
    /// Record's client reference, echoed back by the provider in webhooks so
    /// an event can be matched before the provider id is stored.
    pub reference: Option<String>,
}

/// Provider view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIntent {
    /// Provider's transaction id; becomes the record's provider reference.
    pub external_id: String,
    /// Handle for the client UI (card client secret, approval URL).
    pub client_secret: Option<String>,
    pub status: IntentStatus,
}

/// Normalised provider transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Money captured.
    Succeeded,
    /// Created and awaiting customer action or provider settlement.
    Pending,
    /// Declined or errored at the provider.
    Failed,
    /// Voided before completion.
    Canceled,
}

impl IntentStatus {
    /// True when the provider has definitely not moved money and never will.
    pub fn is_definite_failure(&self) -> bool {
        matches!(self, IntentStatus::Failed | IntentStatus::Canceled)
    }

    /// Record status a provider answer settles to.
    ///
    /// Pending counts as accepted: the provider holds the transaction and
    /// will report a later failure through a webhook.
    pub fn settles_to(&self) -> PaymentStatus {
        if self.is_definite_failure() {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Success
        }
    }
}

/// Request to refund a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub external_id: String,
    pub amount: Option<Decimal>,
    pub currency: Currency,
    pub idempotency_key: String,
}

/// Result of a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRefund {
    pub refund_id: String,
    pub status: String,
}

/// Errors from provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    /// Provider that produced the error.
    pub provider: String,

    /// Error code for categorization.
    pub code: GatewayErrorCode,

    /// Human-readable message, usually the provider's own.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// The provider may have acted on the request.
    pub ambiguous: bool,
}

impl GatewayError {
    /// Create a new gateway error. Only timeouts and server errors are ambiguous.
    pub fn new(provider: &str, code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            code,
            message: message.into(),
            provider_code: None,
            ambiguous: code.is_ambiguous(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Connection never established; nothing reached the provider.
    pub fn unreachable(provider: &str, message: impl Into<String>) -> Self {
        Self::new(provider, GatewayErrorCode::Unreachable, message)
    }

    /// No answer within the deadline; the provider may have acted.
    pub fn timeout(provider: &str, message: impl Into<String>) -> Self {
        Self::new(provider, GatewayErrorCode::Timeout, message)
    }

    /// Maps a non-2xx HTTP status from the provider.
    pub fn from_status(provider: &str, status: u16, message: impl Into<String>) -> Self {
        let code = match status {
            401 | 403 => GatewayErrorCode::Authentication,
            402 => GatewayErrorCode::Declined,
            404 => GatewayErrorCode::NotFound,
            429 => GatewayErrorCode::RateLimited,
            400..=499 => GatewayErrorCode::InvalidRequest,
            _ => GatewayErrorCode::ServerError,
        };
        Self::new(provider, code, message)
    }

    /// Maps a reqwest transport error, classifying ambiguity.
    pub fn from_transport(provider: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(provider, err.to_string())
        } else if err.is_connect() || err.is_builder() {
            Self::unreachable(provider, err.to_string())
        } else {
            // Sent but the response was lost or unreadable.
            Self::new(provider, GatewayErrorCode::ResponseLost, err.to_string())
        }
    }

    /// Response arrived but could not be understood.
    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::new(provider, GatewayErrorCode::ResponseLost, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.provider, self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        PaymentError::Provider {
            provider: err.provider,
            message: err.message,
        }
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    /// Could not connect.
    Unreachable,

    /// Deadline exceeded after the request may have been sent.
    Timeout,

    /// Request sent, response missing or unreadable.
    ResponseLost,

    /// API authentication failed.
    Authentication,

    /// Payment declined.
    Declined,

    /// Transaction not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimited,

    /// Rejected as malformed.
    InvalidRequest,

    /// Provider-side 5xx.
    ServerError,
}

impl GatewayErrorCode {
    /// Whether the provider might have completed the operation.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::Timeout | GatewayErrorCode::ResponseLost | GatewayErrorCode::ServerError
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::Unreachable => "unreachable",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::ResponseLost => "response_lost",
            GatewayErrorCode::Authentication => "authentication_error",
            GatewayErrorCode::Declined => "declined",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::RateLimited => "rate_limited",
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::ServerError => "server_error",
        };
        write!(f, "{}", s)
    }
}

//! Provider webhook events and errors.
//!
//! Each provider speaks its own event dialect; adapters normalise them into
//! [`ProviderEvent`] after the signature has been verified.

use axum::http::StatusCode;
use thiserror::Error;

/// A verified provider notification, reduced to what reconciliation needs.
///
/// `reference` is the provider's transaction id. `client_reference` is the
/// record reference sent with the create call, when the provider echoes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The provider settled the transaction.
    Succeeded {
        event_id: String,
        reference: String,
        client_reference: Option<String>,
    },
    /// The provider declined or voided the transaction.
    Failed {
        event_id: String,
        reference: String,
        client_reference: Option<String>,
        reason: Option<String>,
    },
    /// Any event type reconciliation does not act on.
    Unknown { event_id: String, event_type: String },
}

impl ProviderEvent {
    pub fn event_id(&self) -> &str {
        match self {
            ProviderEvent::Succeeded { event_id, .. }
            | ProviderEvent::Failed { event_id, .. }
            | ProviderEvent::Unknown { event_id, .. } => event_id,
        }
    }

    pub fn client_reference(&self) -> Option<&str> {
        match self {
            ProviderEvent::Succeeded {
                client_reference, ..
            }
            | ProviderEvent::Failed {
                client_reference, ..
            } => client_reference.as_deref(),
            ProviderEvent::Unknown { .. } => None,
        }
    }
}

/// Why a webhook delivery was not applied.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// HMAC mismatch.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed too long ago.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed too far in the future.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Body or signature header did not parse.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Body parsed but lacks a field reconciliation needs.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// No verifier registered for the provider.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Repository failed while applying the event.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WebhookError {
    /// Maps the error to the status returned to the provider.
    ///
    /// 400 for anything wrong with the request itself; storage failures
    /// answer 500 so the provider redelivers.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_)
            | WebhookError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
            WebhookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_problems_map_to_bad_request() {
        for err in [
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
            WebhookError::ParseError("bad json".into()),
            WebhookError::MissingField("id"),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn storage_failure_asks_for_redelivery() {
        let err = WebhookError::Storage("pool timed out".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
    }

    #[test]
    fn event_id_is_available_for_every_variant() {
        let event = ProviderEvent::Unknown {
            event_id: "evt_1".into(),
            event_type: "charge.dispute.created".into(),
        };
        assert_eq!(event.event_id(), "evt_1");
    }
}

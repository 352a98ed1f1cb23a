//! Stripe webhook verification.
//!
//! # Security
//!
//! - HMAC-SHA256 over `"{t}.{payload}"` with constant-time comparison
//! - Events older than 5 minutes are rejected to prevent replay
//! - Up to 60 seconds of future clock skew is tolerated

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::payment::{ProviderEvent, WebhookError};
use crate::ports::WebhookVerifier;

use super::gateway::PROVIDER;
use super::wire::{SignatureHeader, StripeEvent, StripePaymentIntent};

type HmacSha256 = Hmac<Sha256>;

/// Deliveries signed longer ago than this are replays.
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Allowed lead of the signed timestamp over our clock.
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

pub struct StripeWebhookVerifier {
    /// Endpoint secret, `whsec_` prefixed.
    webhook_secret: SecretString,
    /// Reject test-mode events.
    require_livemode: bool,
}

impl StripeWebhookVerifier {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: SecretString::new(webhook_secret.into()),
            require_livemode: false,
        }
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), WebhookError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                age_secs = age,
                "Stripe webhook too old, possible replay"
            );
            return Err(WebhookError::TimestampOutOfRange);
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(event_timestamp = header.timestamp, "Stripe webhook from the future");
            return Err(WebhookError::InvalidTimestamp);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| expected.as_slice().ct_eq(candidate).into());
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }

    fn parse_event(&self, payload: &[u8]) -> Result<ProviderEvent, WebhookError> {
        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::ParseError(format!("Invalid JSON: {}", e)))?;

        if self.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Rejected test mode event");
            return Err(WebhookError::ParseError(
                "Test mode events not allowed".to_string(),
            ));
        }

        let intent = || -> Result<StripePaymentIntent, WebhookError> {
            serde_json::from_value(event.data.object.clone())
                .map_err(|e| WebhookError::ParseError(format!("Invalid payment intent: {}", e)))
        };

        Ok(match event.event_type.as_str() {
            "payment_intent.succeeded" => {
                let intent = intent()?;
                ProviderEvent::Succeeded {
                    client_reference: intent.client_reference(),
                    reference: intent.id,
                    event_id: event.id,
                }
            }
            "payment_intent.payment_failed" => {
                let intent = intent()?;
                ProviderEvent::Failed {
                    reason: intent.failure_message(),
                    client_reference: intent.client_reference(),
                    reference: intent.id,
                    event_id: event.id,
                }
            }
            "payment_intent.canceled" => {
                let intent = intent()?;
                ProviderEvent::Failed {
                    client_reference: intent.client_reference(),
                    reference: intent.id,
                    reason: Some("canceled".to_string()),
                    event_id: event.id,
                }
            }
            _ => ProviderEvent::Unknown {
                event_id: event.id,
                event_type: event.event_type.clone(),
            },
        })
    }
}

impl WebhookVerifier for StripeWebhookVerifier {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn verify(&self, payload: &[u8], signature: &str) -> Result<ProviderEvent, WebhookError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            WebhookError::ParseError(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;
        let event = self.parse_event(payload)?;

        tracing::info!(event_id = %event.event_id(), "Stripe webhook signature verified");
        Ok(event)
    }
}

//! PayPal webhook verification (local HMAC mode).
//!
//! The `Paypal-Transmission-Sig` header carries the hex HMAC-SHA256 of the
//! raw body under the configured webhook secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::payment::{ProviderEvent, WebhookError};
use crate::ports::WebhookVerifier;

use super::gateway::PROVIDER;
use super::wire::{WebhookEvent, WebhookResource};

type HmacSha256 = Hmac<Sha256>;

pub struct PayPalWebhookVerifier {
    webhook_secret: SecretString,
}

impl PayPalWebhookVerifier {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: SecretString::new(webhook_secret.into()),
        }
    }

    fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<(), WebhookError> {
        let provided = hex::decode(signature.trim())
            .map_err(|_| WebhookError::ParseError("Transmission signature is not hex".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected.as_slice().ct_eq(&provided).unwrap_u8() != 1 {
            return Err(WebhookError::InvalidSignature);
        }
        Ok(())
    }
}

fn parse_event(payload: &[u8]) -> Result<ProviderEvent, WebhookError> {
    let event: WebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::ParseError(format!("Invalid JSON: {}", e)))?;

    let resource = || -> Result<WebhookResource, WebhookError> {
        serde_json::from_value(event.resource.clone())
            .map_err(|e| WebhookError::ParseError(format!("Invalid resource: {}", e)))
    };

    Ok(match event.event_type.as_str() {
        "CHECKOUT.ORDER.COMPLETED" | "PAYMENT.CAPTURE.COMPLETED" => {
            let resource = resource()?;
            ProviderEvent::Succeeded {
                reference: resource.order_id().to_string(),
                client_reference: resource.client_reference(),
                event_id: event.id,
            }
        }
        "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" | "CHECKOUT.ORDER.VOIDED" => {
            let resource = resource()?;
            let reason = resource
                .status_details
                .as_ref()
                .and_then(|d| d.reason.clone())
                .or_else(|| Some(event.event_type.to_lowercase()));
            ProviderEvent::Failed {
                reference: resource.order_id().to_string(),
                client_reference: resource.client_reference(),
                reason,
                event_id: event.id,
            }
        }
        _ => ProviderEvent::Unknown {
            event_id: event.id,
            event_type: event.event_type.clone(),
        },
    })
}

impl WebhookVerifier for PayPalWebhookVerifier {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn verify(&self, payload: &[u8], signature: &str) -> Result<ProviderEvent, WebhookError> {
        if signature.trim().is_empty() {
            return Err(WebhookError::MissingField("Paypal-Transmission-Sig"));
        }
        self.verify_signature(payload, signature).map_err(|e| {
            tracing::warn!(error = %e, "PayPal webhook signature rejected");
            e
        })?;

        let event = parse_event(payload)?;
        tracing::info!(event_id = %event.event_id(), "PayPal webhook signature verified");
        Ok(event)
    }
}

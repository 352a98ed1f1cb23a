//! PayPal-like orders provider.
//!
//! - [`PayPalGateway`]: OAuth client-credentials, orders and capture refunds
//! - [`PayPalWebhookVerifier`]: `Paypal-Transmission-Sig` HMAC verification

mod gateway;
mod webhook_verifier;
mod wire;

pub use gateway::{PayPalConfig, PayPalGateway};
pub use webhook_verifier::PayPalWebhookVerifier;

//! Stripe-like card provider.
//!
//! - [`StripeGateway`]: payment intents and refunds over the form-encoded API
//! - [`StripeWebhookVerifier`]: `Stripe-Signature` verification and event
//!   normalisation
//!
//! All secrets are handled via `secrecy::SecretString`.

mod gateway;
mod webhook_verifier;
mod wire;

pub use gateway::{StripeConfig, StripeGateway};
pub use webhook_verifier::StripeWebhookVerifier;
pub use wire::{SignatureHeader, SignatureParseError};

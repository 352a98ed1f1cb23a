//! Webhook verification port.

use crate::domain::payment::{ProviderEvent, WebhookError};

/// Verifies a provider's signature over the raw body and normalises the event.
///
/// Implementations must not parse the body before the signature checks out.
pub trait WebhookVerifier: Send + Sync {
    fn provider(&self) -> &'static str;

    fn verify(&self, payload: &[u8], signature: &str) -> Result<ProviderEvent, WebhookError>;
}

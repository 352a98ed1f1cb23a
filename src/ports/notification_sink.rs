//! Notification delivery port.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::Notification;

/// Hands shaped notifications to the delivery mechanism.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), DomainError>;
}

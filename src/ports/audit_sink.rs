//! Audit collaborator port.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::StatusChanged;

/// Receives every status transition. Persistence is the sink's business.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: StatusChanged) -> Result<(), DomainError>;
}

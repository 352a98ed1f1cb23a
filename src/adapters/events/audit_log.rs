//! Audit sink writing every transition to the `audit` tracing target.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::StatusChanged;
use crate::ports::AuditSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: StatusChanged) -> Result<(), DomainError> {
        tracing::info!(
            target: "audit",
            entity_type = event.entity_type,
            entity_id = %event.entity_id,
            old_status = %event.old_status,
            new_status = %event.new_status,
            actor = %event.actor,
            at = %event.timestamp.as_datetime().to_rfc3339(),
            "status changed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::payment::{Actor, PaymentStatus};

    #[tokio::test]
    async fn recording_never_fails() {
        let sink = TracingAuditSink::new();
        let event = StatusChanged {
            entity_type: "payment",
            entity_id: "abc".into(),
            old_status: PaymentStatus::Processing,
            new_status: PaymentStatus::Success,
            actor: Actor::Webhook("stripe".into()),
            timestamp: Timestamp::now(),
        };

        assert!(sink.record(event).await.is_ok());
    }
}

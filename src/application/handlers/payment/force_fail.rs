//! ForceFailHandler - operator resolution of a record stuck in PROCESSING.

use std::sync::Arc;

use crate::application::record_locks::RecordLocks;
use crate::application::status_writer::{StatusWriter, WriteOutcome};
use crate::domain::payment::{Actor, PaymentError, PaymentStatus, Settleable};

pub struct ForceFailHandler<T: Settleable> {
    writer: StatusWriter<T>,
    locks: Arc<RecordLocks>,
}

impl<T: Settleable> ForceFailHandler<T> {
    pub fn new(writer: StatusWriter<T>, locks: Arc<RecordLocks>) -> Self {
        Self { writer, locks }
    }

    /// Moves a PROCESSING record to FAILED on an operator's say-so.
    pub async fn handle(&self, id: &T::Id, operator: &str, reason: Option<&str>) -> Result<T, PaymentError> {
        let _guard = self.locks.acquire(&RecordLocks::key(T::ENTITY, id)).await;

        let mut record = self
            .writer
            .repository()
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentError::not_found(T::ENTITY, id))?;

        if record.status() != PaymentStatus::Processing {
            return Err(PaymentError::InvalidTransition {
                from: record.status(),
                to: PaymentStatus::Failed,
            });
        }

        let actor = Actor::Operator(operator.to_string());
        let reason = reason.unwrap_or("cancelled by operator");
        match self
            .writer
            .advance(&mut record, PaymentStatus::Failed, None, &actor, Some(reason))
            .await?
        {
            WriteOutcome::Written => {
                tracing::warn!(entity = T::ENTITY, id = %id, operator, "record force-failed");
                Ok(record)
            }
            WriteOutcome::LostRace => {
                let current = self
                    .writer
                    .repository()
                    .find_by_id(id)
                    .await?
                    .map(|r| r.status())
                    .unwrap_or(PaymentStatus::Processing);
                Err(PaymentError::InvalidTransition {
                    from: current,
                    to: PaymentStatus::Failed,
                })
            }
        }
    }
}

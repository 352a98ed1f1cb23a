//! The single status-update path.
//!
//! Processing, webhooks, the sweep, refunds and operator actions all write
//! status through [`StatusWriter`], so every transition gets the same
//! compare-and-swap, audit event, notification and enrollment cascade.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{
    Actor, NotificationContext, NotificationEmitter, PaymentError, PaymentStatus, Settleable,
    StatusChanged,
};
use crate::ports::{
    AuditSink, EnrollmentNotifier, NotificationSink, SettlementRepository, TransitionOutcome,
};

/// Collaborators informed after a committed transition.
#[derive(Clone)]
pub struct SettlementEffects {
    pub notifications: Arc<dyn NotificationSink>,
    pub enrollments: Arc<dyn EnrollmentNotifier>,
    pub audit: Arc<dyn AuditSink>,
}

/// Result of [`StatusWriter::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Stored status had moved on; nothing written, no effects run.
    LostRace,
}

pub struct StatusWriter<T: Settleable> {
    repository: Arc<dyn SettlementRepository<T>>,
    effects: SettlementEffects,
}

impl<T: Settleable> Clone for StatusWriter<T> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            effects: self.effects.clone(),
        }
    }
}

impl<T: Settleable> StatusWriter<T> {
    pub fn new(repository: Arc<dyn SettlementRepository<T>>, effects: SettlementEffects) -> Self {
        Self {
            repository,
            effects,
        }
    }

    pub fn repository(&self) -> &Arc<dyn SettlementRepository<T>> {
        &self.repository
    }

    /// Moves `record` to `target`, conditioned on its current stored status.
    ///
    /// On success `record` reflects the stored state and side effects have
    /// run exactly once. On a lost race `record` is left untouched.
    pub async fn advance(
        &self,
        record: &mut T,
        target: PaymentStatus,
        new_reference: Option<String>,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<WriteOutcome, PaymentError> {
        let mut next = record.clone();
        let previous = next.apply_status(target, Timestamp::now())?;
        if let Some(reference) = new_reference {
            next.assign_provider_reference(reference);
        }

        match self.repository.compare_and_set(&next, previous).await? {
            TransitionOutcome::Conflict => {
                tracing::info!(
                    entity = T::ENTITY,
                    id = %next.id(),
                    expected = %previous,
                    target = %target,
                    "status write lost race, treating as no-op"
                );
                return Ok(WriteOutcome::LostRace);
            }
            TransitionOutcome::Applied => {}
        }

        *record = next;
        self.after_commit(record, previous, actor, reason).await;
        Ok(WriteOutcome::Written)
    }

    async fn after_commit(
        &self,
        record: &T,
        previous: PaymentStatus,
        actor: &Actor,
        reason: Option<&str>,
    ) {
        let status = record.status();
        let event = StatusChanged {
            entity_type: T::ENTITY,
            entity_id: record.id().to_string(),
            old_status: previous,
            new_status: status,
            actor: actor.clone(),
            timestamp: Timestamp::now(),
        };
        if let Err(e) = self.effects.audit.record(event).await {
            tracing::warn!(entity = T::ENTITY, id = %record.id(), error = %e, "audit sink rejected event");
        }

        if matches!(
            status,
            PaymentStatus::Success | PaymentStatus::Failed | PaymentStatus::Refunded
        ) {
            let mut ctx = NotificationContext::new(record.id())
                .entity(T::ENTITY)
                .amount(record.amount(), record.currency());
            if let Some(reason) = reason {
                ctx = ctx.reason(reason);
            }
            let notification = NotificationEmitter::emit(status, &ctx);
            if let Err(e) = self.effects.notifications.deliver(notification).await {
                tracing::warn!(entity = T::ENTITY, id = %record.id(), error = %e, "notification delivery failed");
            }
        }

        if let Some((enrollment_id, outcome)) = record.cascade(status) {
            if let Err(e) = self
                .effects
                .enrollments
                .on_payment_outcome(enrollment_id, outcome)
                .await
            {
                tracing::error!(
                    enrollment_id = %enrollment_id,
                    outcome = %outcome,
                    error = %e,
                    "enrollment collaborator rejected payment outcome"
                );
            }
        }
    }
}

//! WebhookReconciler - applies provider-pushed outcomes to local records.
//!
//! Deliveries are at-least-once, possibly duplicated and out of order. The
//! reconciler is idempotent by construction: a record already in the
//! reported state is left alone, and every write is conditioned on the
//! status it was read in.
//!
//! Records are matched on the provider's transaction id first, then on the
//! client reference the provider echoes back. The second lookup finds
//! records whose processing call timed out before the id was stored; a
//! SUCCESS applied that way stores the provider id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::record_locks::RecordLocks;
use crate::application::status_writer::{StatusWriter, WriteOutcome};
use crate::domain::payment::{
    Actor, Donation, PaymentError, PaymentRecord, PaymentStatus, ProviderEvent, Settleable,
    WebhookError,
};
use crate::ports::WebhookVerifier;

/// Command to reconcile one webhook delivery.
#[derive(Debug, Clone)]
pub struct ReconcileWebhookCommand {
    /// Provider the endpoint belongs to, e.g. `"stripe"`.
    pub provider: String,
    /// Raw request body, exactly as received.
    pub payload: Vec<u8>,
    /// Provider signature header value.
    pub signature: String,
}

/// What the delivery did. Every variant is acknowledged to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Record moved to the reported status.
    Applied {
        entity: &'static str,
        id: String,
        status: PaymentStatus,
    },
    /// Record was already in the reported status.
    AlreadyApplied { entity: &'static str, id: String },
    /// Record is in a state the reported outcome cannot follow.
    Skipped {
        entity: &'static str,
        id: String,
        current: PaymentStatus,
    },
    /// No payment or donation carries the reference.
    Unmatched { reference: String },
    /// Event type reconciliation does not act on.
    Ignored { event_type: String },
}

pub struct WebhookReconciler {
    payments: StatusWriter<PaymentRecord>,
    donations: StatusWriter<Donation>,
    locks: Arc<RecordLocks>,
    verifiers: HashMap<&'static str, Arc<dyn WebhookVerifier>>,
}

impl WebhookReconciler {
    pub fn new(
        payments: StatusWriter<PaymentRecord>,
        donations: StatusWriter<Donation>,
        locks: Arc<RecordLocks>,
    ) -> Self {
        Self {
            payments,
            donations,
            locks,
            verifiers: HashMap::new(),
        }
    }

    /// Registers the verifier for a provider endpoint.
    pub fn with_verifier(mut self, verifier: Arc<dyn WebhookVerifier>) -> Self {
        self.verifiers.insert(verifier.provider(), verifier);
        self
    }

    pub async fn reconcile(
        &self,
        cmd: ReconcileWebhookCommand,
    ) -> Result<ReconcileResult, WebhookError> {
        let verifier = self
            .verifiers
            .get(cmd.provider.as_str())
            .ok_or_else(|| WebhookError::UnknownProvider(cmd.provider.clone()))?;

        let event = verifier
            .verify(&cmd.payload, &cmd.signature)
            .map_err(|e| {
                tracing::warn!(provider = %cmd.provider, error = %e, "webhook rejected");
                e
            })?;

        let actor = Actor::Webhook(verifier.provider().to_string());
        let client_reference = event.client_reference().map(str::to_string);
        let (reference, target, reason) = match event {
            ProviderEvent::Succeeded { reference, .. } => (reference, PaymentStatus::Success, None),
            ProviderEvent::Failed {
                reference, reason, ..
            } => (reference, PaymentStatus::Failed, reason),
            ProviderEvent::Unknown {
                event_id,
                event_type,
            } => {
                tracing::debug!(%event_id, %event_type, "webhook event type ignored");
                return Ok(ReconcileResult::Ignored { event_type });
            }
        };

        let fallback = client_reference.filter(|c| *c != reference);
        for candidate in std::iter::once(reference.as_str()).chain(fallback.as_deref()) {
            if let Some(record) = self
                .payments
                .repository()
                .find_by_reference(candidate)
                .await
                .map_err(storage)?
            {
                return self
                    .apply(
                        &self.payments,
                        record.id(),
                        target,
                        &reference,
                        &actor,
                        reason.as_deref(),
                    )
                    .await;
            }

            if let Some(donation) = self
                .donations
                .repository()
                .find_by_reference(candidate)
                .await
                .map_err(storage)?
            {
                return self
                    .apply(
                        &self.donations,
                        donation.id(),
                        target,
                        &reference,
                        &actor,
                        reason.as_deref(),
                    )
                    .await;
            }
        }

        tracing::info!(
            %reference,
            client_reference = ?fallback,
            "webhook references no known record, acknowledging"
        );
        Ok(ReconcileResult::Unmatched { reference })
    }

    async fn apply<T: Settleable>(
        &self,
        writer: &StatusWriter<T>,
        id: T::Id,
        target: PaymentStatus,
        provider_reference: &str,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<ReconcileResult, WebhookError> {
        let _guard = self.locks.acquire(&RecordLocks::key(T::ENTITY, id)).await;

        // A lost race means another instance moved the record; re-read once.
        for _ in 0..2 {
            let Some(mut record) = writer.repository().find_by_id(&id).await.map_err(storage)?
            else {
                return Ok(ReconcileResult::Unmatched {
                    reference: id.to_string(),
                });
            };

            let current = record.status();
            if current == target {
                return Ok(ReconcileResult::AlreadyApplied {
                    entity: T::ENTITY,
                    id: id.to_string(),
                });
            }

            let Some(path) = current.path_to(target) else {
                tracing::warn!(
                    entity = T::ENTITY,
                    id = %id,
                    current = %current,
                    reported = %target,
                    "webhook outcome conflicts with settled status, not applying"
                );
                return Ok(ReconcileResult::Skipped {
                    entity: T::ENTITY,
                    id: id.to_string(),
                    current,
                });
            };

            let mut lost = false;
            for step in path {
                let step_reason = if step == target { reason } else { None };
                let new_reference = (step == PaymentStatus::Success
                    && record.provider_reference() != Some(provider_reference))
                .then(|| provider_reference.to_string());
                let outcome = writer
                    .advance(&mut record, step, new_reference, actor, step_reason)
                    .await
                    .map_err(write_failure)?;
                if outcome == WriteOutcome::LostRace {
                    lost = true;
                    break;
                }
            }

            if !lost {
                tracing::info!(entity = T::ENTITY, id = %id, status = %target, "webhook applied");
                return Ok(ReconcileResult::Applied {
                    entity: T::ENTITY,
                    id: id.to_string(),
                    status: target,
                });
            }
        }

        let current = writer
            .repository()
            .find_by_id(&id)
            .await
            .map_err(storage)?
            .map(|r| r.status())
            .unwrap_or(PaymentStatus::Processing);
        Ok(ReconcileResult::Skipped {
            entity: T::ENTITY,
            id: id.to_string(),
            current,
        })
    }
}

fn storage(err: crate::domain::foundation::DomainError) -> WebhookError {
    WebhookError::Storage(err.to_string())
}

fn write_failure(err: PaymentError) -> WebhookError {
    WebhookError::Storage(err.to_string())
}

//! PaymentProcessor - synchronous processing of a pending payment or donation.

use std::sync::Arc;

use crate::application::record_locks::RecordLocks;
use crate::application::status_writer::{StatusWriter, WriteOutcome};
use crate::domain::payment::{Actor, PaymentError, PaymentStatus, Settleable};
use crate::ports::{IntentRequest, ProviderGateway};

/// Result of a successful `process` call.
#[derive(Debug, Clone)]
pub struct ProcessOutcome<T> {
    pub record: T,
    /// Handle for card-entry or approval UIs.
    pub client_secret: Option<String>,
}

/// Drives a record from PENDING through the provider to SUCCESS or FAILED.
///
/// Only PENDING records are processed; anything else is `AlreadyProcessed`
/// and the provider is never called. A definite provider failure lands the
/// record in FAILED and is still returned as an error. An ambiguous one
/// (timeout, lost response) leaves it in PROCESSING for a webhook, the
/// sweep or an operator to resolve.
pub struct PaymentProcessor<T: Settleable> {
    writer: StatusWriter<T>,
    gateway: Arc<dyn ProviderGateway>,
    locks: Arc<RecordLocks>,
}

impl<T: Settleable> PaymentProcessor<T> {
    pub fn new(
        writer: StatusWriter<T>,
        gateway: Arc<dyn ProviderGateway>,
        locks: Arc<RecordLocks>,
    ) -> Self {
        Self {
            writer,
            gateway,
            locks,
        }
    }

    pub async fn process(&self, id: &T::Id) -> Result<ProcessOutcome<T>, PaymentError> {
        let _guard = self.locks.acquire(&RecordLocks::key(T::ENTITY, id)).await;
        let actor = Actor::System;

        let mut record = self
            .writer
            .repository()
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentError::not_found(T::ENTITY, id))?;

        if record.status() != PaymentStatus::Pending {
            return Err(PaymentError::AlreadyProcessed(record.status()));
        }

        if self
            .writer
            .advance(&mut record, PaymentStatus::Processing, None, &actor, None)
            .await?
            == WriteOutcome::LostRace
        {
            let current = self.current_status(id).await?;
            return Err(PaymentError::AlreadyProcessed(current));
        }

        let request = IntentRequest {
            amount: record.amount(),
            currency: record.currency(),
            description: record.description(),
            idempotency_key: record.idempotency_key(),
            reference: record.provider_reference().map(str::to_string),
        };

        match self.gateway.create_intent(request).await {
            Ok(intent) if intent.status.settles_to() == PaymentStatus::Failed => {
                let reason = format!("provider reported {:?}", intent.status).to_lowercase();
                self.writer
                    .advance(&mut record, PaymentStatus::Failed, None, &actor, Some(&reason))
                    .await?;
                Err(PaymentError::Provider {
                    provider: self.gateway.provider().to_string(),
                    message: reason,
                })
            }
            Ok(intent) => {
                let outcome = self
                    .writer
                    .advance(
                        &mut record,
                        PaymentStatus::Success,
                        Some(intent.external_id.clone()),
                        &actor,
                        None,
                    )
                    .await?;
                if outcome == WriteOutcome::LostRace {
                    // Resolved elsewhere while the provider call was in flight.
                    record = self.reload(id).await?;
                }
                tracing::info!(
                    entity = T::ENTITY,
                    id = %id,
                    external_id = %intent.external_id,
                    status = %record.status(),
                    "payment processed"
                );
                Ok(ProcessOutcome {
                    record,
                    client_secret: intent.client_secret,
                })
            }
            Err(e) if e.ambiguous => {
                tracing::warn!(
                    entity = T::ENTITY,
                    id = %id,
                    provider = %e.provider,
                    error = %e,
                    "ambiguous provider outcome, leaving record in PROCESSING"
                );
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!(
                    entity = T::ENTITY,
                    id = %id,
                    provider = %e.provider,
                    error = %e,
                    "provider rejected payment"
                );
                self.writer
                    .advance(&mut record, PaymentStatus::Failed, None, &actor, Some(&e.message))
                    .await?;
                Err(e.into())
            }
        }
    }

    async fn reload(&self, id: &T::Id) -> Result<T, PaymentError> {
        self.writer
            .repository()
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentError::not_found(T::ENTITY, id))
    }

    async fn current_status(&self, id: &T::Id) -> Result<PaymentStatus, PaymentError> {
        Ok(self.reload(id).await?.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::GatewayCall;
    use crate::application::handlers::payment::test_support::Harness;
    use crate::domain::foundation::{EnrollmentId, PaymentId};
    use crate::domain::payment::{EnrollmentOutcome, NotificationKind, PaymentKind, PaymentRecord};
    use crate::ports::{GatewayError, IntentStatus};
    use rust_decimal_macros::dec;

    fn processor(h: &Harness) -> PaymentProcessor<PaymentRecord> {
        PaymentProcessor::new(h.payment_writer(), h.gateway.clone(), h.locks.clone())
    }

    // ══════════════════════════════════════════════════════════════
    // Success path
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn success_overwrites_reference_and_notifies_once() {
        let h = Harness::new();
        let record = h.seed_payment(PaymentKind::General).await;

        let outcome = processor(&h).process(&record.id).await.unwrap();

        assert_eq!(outcome.record.status, PaymentStatus::Success);
        assert_eq!(outcome.record.provider_reference, "mock_pi_1");
        assert_eq!(outcome.client_secret.as_deref(), Some("mock_pi_1_secret"));

        let notices = h.notifications.delivered().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn sends_amount_description_and_idempotency_key() {
        let h = Harness::new();
        let record = h.seed_payment(PaymentKind::General).await;

        processor(&h).process(&record.id).await.unwrap();

        let calls = h.gateway.calls().await;
        match &calls[0] {
            GatewayCall::CreateIntent(request) => {
                assert_eq!(request.amount, dec!(100.00));
                assert_eq!(request.idempotency_key, format!("payment-{}", record.id));
                assert_eq!(request.reference.as_deref(), Some(record.provider_reference.as_str()));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[tokio::test]
    async fn enrollment_payment_cascades_paid() {
        let h = Harness::new();
        let enrollment_id = EnrollmentId::new();
        let record = h.seed_payment(PaymentKind::Enrollment { enrollment_id }).await;

        processor(&h).process(&record.id).await.unwrap();

        assert_eq!(
            h.enrollments.outcomes().await,
            vec![(enrollment_id, EnrollmentOutcome::Paid)]
        );
    }

    #[tokio::test]
    async fn audits_both_transitions() {
        let h = Harness::new();
        let record = h.seed_payment(PaymentKind::General).await;

        processor(&h).process(&record.id).await.unwrap();

        let events = h.audit.events().await;
        let pairs: Vec<_> = events.iter().map(|e| (e.old_status, e.new_status)).collect();
        assert_eq!(
            pairs,
            vec![
                (PaymentStatus::Pending, PaymentStatus::Processing),
                (PaymentStatus::Processing, PaymentStatus::Success)
            ]
        );
        assert!(events.iter().all(|e| e.actor == Actor::System));
    }

    // ══════════════════════════════════════════════════════════════
    // Idempotency boundary
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn second_process_is_already_processed_without_provider_call() {
        let h = Harness::new();
        let record = h.seed_payment(PaymentKind::General).await;
        let processor = processor(&h);

        processor.process(&record.id).await.unwrap();
        let err = processor.process(&record.id).await.unwrap_err();

        assert_eq!(err, PaymentError::AlreadyProcessed(PaymentStatus::Success));
        assert_eq!(h.gateway.create_intent_calls().await, 1);
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let h = Harness::new();
        let err = processor(&h).process(&PaymentId::new()).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { entity: "payment", .. }));
    }

    // ══════════════════════════════════════════════════════════════
    // Failure paths
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn definite_failure_marks_failed_and_surfaces_error() {
        let h = Harness::new();
        let enrollment_id = EnrollmentId::new();
        let record = h.seed_payment(PaymentKind::Enrollment { enrollment_id }).await;
        h.gateway
            .fail_next_create(GatewayError::from_status("mock", 402, "card_declined"))
            .await;

        let err = processor(&h).process(&record.id).await.unwrap_err();

        assert_eq!(
            err,
            PaymentError::Provider {
                provider: "mock".to_string(),
                message: "card_declined".to_string()
            }
        );
        let stored = h.payment(&record.id).await;
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(stored.provider_reference, record.provider_reference);

        let notices = h.notifications.delivered().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::Error);
        assert!(notices[0].message.contains("card_declined"));
        assert_eq!(
            h.enrollments.outcomes().await,
            vec![(enrollment_id, EnrollmentOutcome::Unpaid)]
        );
    }

    #[tokio::test]
    async fn canceled_intent_is_a_definite_failure() {
        let h = Harness::new();
        let record = h.seed_payment(PaymentKind::General).await;
        h.gateway.next_create_status(IntentStatus::Canceled).await;

        assert!(processor(&h).process(&record.id).await.is_err());
        assert_eq!(h.payment(&record.id).await.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn ambiguous_failure_leaves_processing() {
        let h = Harness::new();
        let enrollment_id = EnrollmentId::new();
        let record = h.seed_payment(PaymentKind::Enrollment { enrollment_id }).await;
        h.gateway
            .fail_next_create(GatewayError::timeout("mock", "deadline exceeded"))
            .await;

        let err = processor(&h).process(&record.id).await.unwrap_err();

        assert!(matches!(err, PaymentError::Provider { .. }));
        assert_eq!(h.payment(&record.id).await.status, PaymentStatus::Processing);
        assert!(h.notifications.delivered().await.is_empty());
        assert!(h.enrollments.outcomes().await.is_empty());
    }

    #[tokio::test]
    async fn donation_is_processed_without_cascade() {
        let h = Harness::new();
        let donation = h.seed_donation().await;
        let processor = PaymentProcessor::new(h.donation_writer(), h.gateway.clone(), h.locks.clone());

        let outcome = processor.process(&donation.id).await.unwrap();

        assert_eq!(outcome.record.status, PaymentStatus::Success);
        assert_eq!(outcome.record.provider_reference.as_deref(), Some("mock_pi_1"));
        assert!(h.enrollments.outcomes().await.is_empty());
        match &h.gateway.calls().await[0] {
            GatewayCall::CreateIntent(request) => {
                assert_eq!(request.description, "Donation from Ana")
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}

//! RefundHandler - Command handler for refunding a settled payment.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::application::record_locks::RecordLocks;
use crate::application::status_writer::{StatusWriter, WriteOutcome};
use crate::domain::payment::{Actor, PaymentError, PaymentStatus, Settleable};
use crate::ports::{ProviderGateway, ProviderRefund, RefundRequest};

/// Command to refund a record, fully when `amount` is `None`.
#[derive(Debug, Clone)]
pub struct RefundCommand<Id> {
    pub id: Id,
    pub amount: Option<Decimal>,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct RefundResult<T> {
    pub record: T,
    pub refund: ProviderRefund,
}

/// Refunds SUCCESS records at the provider and moves them to REFUNDED.
pub struct RefundHandler<T: Settleable> {
    writer: StatusWriter<T>,
    gateway: Arc<dyn ProviderGateway>,
    locks: Arc<RecordLocks>,
}

impl<T: Settleable> RefundHandler<T> {
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

    pub async fn handle(&self, cmd: RefundCommand<T::Id>) -> Result<RefundResult<T>, PaymentError> {
        let _guard = self.locks.acquire(&RecordLocks::key(T::ENTITY, cmd.id)).await;

        let mut record = self
            .writer
            .repository()
            .find_by_id(&cmd.id)
            .await?
            .ok_or_else(|| PaymentError::not_found(T::ENTITY, cmd.id))?;

        if record.status() != PaymentStatus::Success {
            return Err(PaymentError::InvalidTransition {
                from: record.status(),
                to: PaymentStatus::Refunded,
            });
        }
        if let Some(amount) = cmd.amount {
            if amount <= Decimal::ZERO || amount > record.amount() {
                return Err(PaymentError::InvalidAmount(amount));
            }
        }
        let external_id = record
            .provider_reference()
            .map(str::to_string)
            .ok_or_else(|| PaymentError::Infrastructure("settled record has no provider reference".into()))?;

        let refund = self
            .gateway
            .refund(RefundRequest {
                external_id,
                amount: cmd.amount,
                currency: record.currency(),
                idempotency_key: format!("refund-{}", record.idempotency_key()),
            })
            .await?;

        if self
            .writer
            .advance(&mut record, PaymentStatus::Refunded, None, &cmd.actor, None)
            .await?
            == WriteOutcome::LostRace
        {
            tracing::warn!(entity = T::ENTITY, id = %cmd.id, "refund issued but status changed concurrently");
        }

        tracing::info!(
            entity = T::ENTITY,
            id = %cmd.id,
            refund_id = %refund.refund_id,
            "refund processed"
        );
        Ok(RefundResult { record, refund })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::GatewayCall;
    use crate::application::handlers::payment::test_support::Harness;
    use crate::domain::foundation::{EnrollmentId, PaymentId};
    use crate::domain::payment::{EnrollmentOutcome, NotificationKind, PaymentKind, PaymentRecord};
    use crate::ports::GatewayError;
    use rust_decimal_macros::dec;

    fn handler(h: &Harness) -> RefundHandler<PaymentRecord> {
        RefundHandler::new(h.payment_writer(), h.gateway.clone(), h.locks.clone())
    }

    fn command(record: &PaymentRecord, amount: Option<Decimal>) -> RefundCommand<PaymentId> {
        RefundCommand {
            id: record.id,
            amount,
            actor: Actor::Operator("backoffice".to_string()),
        }
    }

    #[tokio::test]
    async fn refunds_settled_payment_and_cascades_cancelled() {
        let h = Harness::new();
        let enrollment_id = EnrollmentId::new();
        let record = h
            .seed_settled_payment(PaymentKind::Enrollment { enrollment_id })
            .await;

        let result = handler(&h).handle(command(&record, None)).await.unwrap();

        assert_eq!(result.record.status, PaymentStatus::Refunded);
        assert_eq!(
            h.enrollments.outcomes().await.last(),
            Some(&(enrollment_id, EnrollmentOutcome::Cancelled))
        );
        let notices = h.notifications.delivered().await;
        assert_eq!(notices.last().map(|n| n.kind), Some(NotificationKind::Info));
    }

    #[tokio::test]
    async fn refund_targets_provider_reference() {
        let h = Harness::new();
        let record = h.seed_settled_payment(PaymentKind::General).await;

        handler(&h)
            .handle(command(&record, Some(dec!(40.00))))
            .await
            .unwrap();

        let refunds: Vec<_> = h
            .gateway
            .calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Refund(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].external_id, record.provider_reference);
        assert_eq!(refunds[0].amount, Some(dec!(40.00)));
    }

    #[tokio::test]
    async fn pending_payment_cannot_be_refunded() {
        let h = Harness::new();
        let record = h.seed_payment(PaymentKind::General).await;

        let err = handler(&h).handle(command(&record, None)).await.unwrap_err();

        assert_eq!(
            err,
            PaymentError::InvalidTransition {
                from: PaymentStatus::Pending,
                to: PaymentStatus::Refunded
            }
        );
        assert!(h.gateway.calls().await.is_empty());
    }

    #[tokio::test]
    async fn refund_above_amount_is_rejected() {
        let h = Harness::new();
        let record = h.seed_settled_payment(PaymentKind::General).await;

        let err = handler(&h)
            .handle(command(&record, Some(dec!(100.01))))
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::InvalidAmount(dec!(100.01)));
    }

    #[tokio::test]
    async fn provider_refusal_keeps_success() {
        let h = Harness::new();
        let record = h.seed_settled_payment(PaymentKind::General).await;
        h.gateway
            .fail_refunds(GatewayError::from_status("mock", 400, "charge_already_refunded"))
            .await;

        assert!(handler(&h).handle(command(&record, None)).await.is_err());
        assert_eq!(h.payment(&record.id).await.status, PaymentStatus::Success);
    }
}

//! ReconciliationSweeper - resolves records stuck in PROCESSING.
//!
//! A record stays PROCESSING when the provider call ended ambiguously and
//! no webhook arrived. The sweep asks the provider directly: it re-issues
//! the intent under the record's idempotency key, which returns the
//! original transaction, then confirms that transaction's status. The
//! answer settles the record by the same rule synchronous processing uses.
//!
//! A record the provider cannot answer for has its `updated_at` moved to
//! now, so it waits another `stuck_after` and the next batch reaches the
//! records behind it. Once a record is older than `give_up_after` it is
//! failed instead.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `stuck_after` | 15 min | Minimum time in PROCESSING before a record is swept |
//! | `interval` | 60 s | Time between sweeps |
//! | `batch_size` | 50 | Max records per entity per sweep |
//! | `give_up_after` | 24 h | Age since creation at which an unanswered record is failed |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::record_locks::RecordLocks;
use crate::application::status_writer::{StatusWriter, WriteOutcome};
use crate::domain::foundation::Timestamp;
use crate::domain::payment::{Actor, Donation, PaymentError, PaymentRecord, PaymentStatus, Settleable};
use crate::ports::{IntentRequest, ProviderGateway};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub stuck_after: Duration,
    pub interval: Duration,
    pub batch_size: u32,
    pub give_up_after: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            stuck_after: Duration::from_secs(15 * 60),
            interval: Duration::from_secs(60),
            batch_size: 50,
            give_up_after: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Failure reason recorded when the sweep gives up on a record.
pub const NEVER_SETTLED_REASON: &str = "provider never settled";

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub settled: usize,
    pub failed: usize,
    /// Still PROCESSING: provider unreachable or a lost race.
    pub unresolved: usize,
}

enum Resolution {
    Settled,
    Failed,
    Unresolved,
}

pub struct ReconciliationSweeper {
    payments: StatusWriter<PaymentRecord>,
    donations: StatusWriter<Donation>,
    gateway: Arc<dyn ProviderGateway>,
    locks: Arc<RecordLocks>,
    config: SweepConfig,
}

impl ReconciliationSweeper {
    pub fn new(
        payments: StatusWriter<PaymentRecord>,
        donations: StatusWriter<Donation>,
        gateway: Arc<dyn ProviderGateway>,
        locks: Arc<RecordLocks>,
        config: SweepConfig,
    ) -> Self {
        Self {
            payments,
            donations,
            gateway,
            locks,
            config,
        }
    }

    /// Sweeps until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("reconciliation sweep stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.examined > 0 => {
                            tracing::info!(
                                examined = report.examined,
                                settled = report.settled,
                                failed = report.failed,
                                unresolved = report.unresolved,
                                "reconciliation sweep finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "reconciliation sweep failed"),
                    }
                    self.locks.prune();
                }
            }
        }
    }

    /// One pass over stuck payments, then stuck donations.
    pub async fn sweep_once(&self) -> Result<SweepReport, PaymentError> {
        let cutoff = Timestamp::ago(self.config.stuck_after);
        let mut report = SweepReport::default();
        self.sweep_entity(&self.payments, cutoff, &mut report).await?;
        self.sweep_entity(&self.donations, cutoff, &mut report).await?;
        Ok(report)
    }

    async fn sweep_entity<T: Settleable>(
        &self,
        writer: &StatusWriter<T>,
        cutoff: Timestamp,
        report: &mut SweepReport,
    ) -> Result<(), PaymentError> {
        let stuck = writer
            .repository()
            .find_stuck_processing(cutoff, self.config.batch_size)
            .await?;

        for record in stuck {
            report.examined += 1;
            match self.resolve(writer, record).await? {
                Resolution::Settled => report.settled += 1,
                Resolution::Failed => report.failed += 1,
                Resolution::Unresolved => report.unresolved += 1,
            }
        }
        Ok(())
    }

    async fn resolve<T: Settleable>(
        &self,
        writer: &StatusWriter<T>,
        stale: T,
    ) -> Result<Resolution, PaymentError> {
        let id = stale.id();
        let _guard = self.locks.acquire(&RecordLocks::key(T::ENTITY, id)).await;

        // Re-read under the lock; a webhook may have settled it meanwhile.
        let Some(mut record) = writer.repository().find_by_id(&id).await? else {
            return Ok(Resolution::Unresolved);
        };
        if record.status() != PaymentStatus::Processing {
            return Ok(Resolution::Unresolved);
        }

        let request = IntentRequest {
            amount: record.amount(),
            currency: record.currency(),
            description: record.description(),
            idempotency_key: record.idempotency_key(),
            reference: record.provider_reference().map(str::to_string),
        };
        let confirmed = match self.gateway.create_intent(request).await {
            Ok(intent) => self.gateway.confirm(&intent.external_id).await,
            Err(e) => Err(e),
        };

        let intent = match confirmed {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(
                    entity = T::ENTITY,
                    id = %id,
                    error = %e,
                    "provider unavailable during sweep"
                );
                return self.unanswered(writer, record).await;
            }
        };

        let actor = Actor::Sweep;
        let target = intent.status.settles_to();
        let (new_reference, reason, resolution) = match target {
            PaymentStatus::Success => (Some(intent.external_id.clone()), None, Resolution::Settled),
            _ => (
                None,
                Some(format!("provider reported {:?}", intent.status).to_lowercase()),
                Resolution::Failed,
            ),
        };

        match writer
            .advance(&mut record, target, new_reference, &actor, reason.as_deref())
            .await?
        {
            WriteOutcome::Written => Ok(resolution),
            WriteOutcome::LostRace => Ok(Resolution::Unresolved),
        }
    }

    /// Fails a record past `give_up_after`; otherwise sends it to the back
    /// of the stuck queue.
    async fn unanswered<T: Settleable>(
        &self,
        writer: &StatusWriter<T>,
        mut record: T,
    ) -> Result<Resolution, PaymentError> {
        let id = record.id();

        if record
            .created_at()
            .is_before(&Timestamp::ago(self.config.give_up_after))
        {
            tracing::warn!(entity = T::ENTITY, id = %id, "giving up on record, marking failed");
            return match writer
                .advance(
                    &mut record,
                    PaymentStatus::Failed,
                    None,
                    &Actor::Sweep,
                    Some(NEVER_SETTLED_REASON),
                )
                .await?
            {
                WriteOutcome::Written => Ok(Resolution::Failed),
                WriteOutcome::LostRace => Ok(Resolution::Unresolved),
            };
        }

        record.touch(Timestamp::now());
        writer
            .repository()
            .compare_and_set(&record, PaymentStatus::Processing)
            .await?;
        Ok(Resolution::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::GatewayCall;
    use crate::application::handlers::payment::test_support::Harness;
    use crate::application::handlers::payment::PaymentProcessor;
    use crate::domain::foundation::EnrollmentId;
    use crate::domain::payment::{EnrollmentOutcome, NotificationKind, PaymentKind};
    use crate::ports::{GatewayError, IntentStatus, SettlementRepository};

    fn sweeper(h: &Harness) -> ReconciliationSweeper {
        sweeper_with(
            h,
            SweepConfig {
                stuck_after: Duration::from_secs(60),
                ..SweepConfig::default()
            },
        )
    }

    fn sweeper_with(h: &Harness, config: SweepConfig) -> ReconciliationSweeper {
        ReconciliationSweeper::new(
            h.payment_writer(),
            h.donation_writer(),
            h.gateway.clone(),
            h.locks.clone(),
            config,
        )
    }

    fn swept_keys(calls: &[GatewayCall]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::CreateIntent(request) => Some(request.idempotency_key.clone()),
                _ => None,
            })
            .collect()
    }

    async fn stuck_payment(h: &Harness, kind: PaymentKind, age_secs: u64) -> PaymentRecord {
        let record = h.seed_processing_payment(kind).await;
        let mut aged = record.clone();
        aged.updated_at = Timestamp::ago(Duration::from_secs(age_secs));
        h.payments
            .compare_and_set(&aged, PaymentStatus::Processing)
            .await
            .unwrap();
        aged
    }

    // ══════════════════════════════════════════════════════════════
    // Resolution
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn succeeded_intent_settles_and_cascades() {
        let h = Harness::new();
        let enrollment_id = EnrollmentId::new();
        let record = stuck_payment(&h, PaymentKind::Enrollment { enrollment_id }, 600).await;

        let report = sweeper(&h).sweep_once().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                examined: 1,
                settled: 1,
                failed: 0,
                unresolved: 0
            }
        );
        let stored = h.payment(&record.id).await;
        assert_eq!(stored.status, PaymentStatus::Success);
        assert_eq!(stored.provider_reference, "mock_pi_1");
        assert_eq!(
            h.enrollments.outcomes().await,
            vec![(enrollment_id, EnrollmentOutcome::Paid)]
        );
        let audit = h.audit.events().await;
        assert_eq!(audit[0].actor, Actor::Sweep);
    }

    #[tokio::test]
    async fn reissue_uses_record_idempotency_key_then_confirms() {
        let h = Harness::new();
        let record = stuck_payment(&h, PaymentKind::General, 600).await;

        sweeper(&h).sweep_once().await.unwrap();

        let calls = h.gateway.calls().await;
        assert_eq!(calls.len(), 2);
        match &calls[0] {
            GatewayCall::CreateIntent(request) => {
                assert_eq!(request.idempotency_key, format!("payment-{}", record.id));
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(calls[1], GatewayCall::Confirm("mock_pi_1".to_string()));
    }

    #[tokio::test]
    async fn canceled_intent_fails_record() {
        let h = Harness::new();
        let record = stuck_payment(&h, PaymentKind::General, 600).await;
        h.gateway.set_confirm_status(IntentStatus::Canceled).await;

        let report = sweeper(&h).sweep_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(h.payment(&record.id).await.status, PaymentStatus::Failed);
        let notices = h.notifications.delivered().await;
        assert_eq!(notices[0].kind, NotificationKind::Error);
    }

    #[tokio::test]
    async fn pending_intent_settles_the_same_in_process_and_sweep() {
        let h = Harness::new();

        let fresh = h.seed_payment(PaymentKind::General).await;
        h.gateway.next_create_status(IntentStatus::Pending).await;
        let processed = PaymentProcessor::new(h.payment_writer(), h.gateway.clone(), h.locks.clone())
            .process(&fresh.id)
            .await
            .unwrap();

        let stuck = stuck_payment(&h, PaymentKind::General, 600).await;
        h.gateway.set_confirm_status(IntentStatus::Pending).await;
        let report = sweeper(&h).sweep_once().await.unwrap();

        assert_eq!(processed.record.status, PaymentStatus::Success);
        assert_eq!(report.settled, 1);
        assert_eq!(report.unresolved, 0);
        assert_eq!(
            h.payment(&stuck.id).await.status,
            h.payment(&fresh.id).await.status
        );
    }

    #[tokio::test]
    async fn provider_outage_keeps_processing_and_requeues() {
        let h = Harness::new();
        let record = stuck_payment(&h, PaymentKind::General, 600).await;
        h.gateway
            .fail_next_create(GatewayError::unreachable("mock", "connection refused"))
            .await;

        let report = sweeper(&h).sweep_once().await.unwrap();

        assert_eq!(report.unresolved, 1);
        let stored = h.payment(&record.id).await;
        assert_eq!(stored.status, PaymentStatus::Processing);
        assert!(record.updated_at.is_before(&stored.updated_at));
        assert!(h.audit.events().await.is_empty());
    }

    #[tokio::test]
    async fn record_past_give_up_age_is_failed() {
        let h = Harness::new();
        let enrollment_id = EnrollmentId::new();
        let mut record = h
            .seed_processing_payment(PaymentKind::Enrollment { enrollment_id })
            .await;
        record.created_at = Timestamp::ago(Duration::from_secs(2 * 24 * 60 * 60));
        record.updated_at = Timestamp::ago(Duration::from_secs(600));
        h.payments
            .compare_and_set(&record, PaymentStatus::Processing)
            .await
            .unwrap();
        h.gateway
            .fail_next_create(GatewayError::timeout("mock", "deadline exceeded"))
            .await;

        let report = sweeper(&h).sweep_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(h.payment(&record.id).await.status, PaymentStatus::Failed);
        let notices = h.notifications.delivered().await;
        assert_eq!(notices[0].kind, NotificationKind::Error);
        assert!(notices[0].message.contains(NEVER_SETTLED_REASON));
        assert_eq!(
            h.enrollments.outcomes().await,
            vec![(enrollment_id, EnrollmentOutcome::Unpaid)]
        );
        assert_eq!(h.audit.events().await[0].actor, Actor::Sweep);
    }

    // ══════════════════════════════════════════════════════════════
    // Selection
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn recent_processing_records_are_not_swept() {
        let h = Harness::new();
        let record = h.seed_processing_payment(PaymentKind::General).await;

        let report = sweeper(&h).sweep_once().await.unwrap();

        assert_eq!(report.examined, 0);
        assert!(h.gateway.calls().await.is_empty());
        assert_eq!(h.payment(&record.id).await.status, PaymentStatus::Processing);
    }

    #[tokio::test]
    async fn unresolved_records_do_not_starve_newer_ones() {
        let h = Harness::new();
        let oldest = stuck_payment(&h, PaymentKind::General, 6000).await;
        let newer = stuck_payment(&h, PaymentKind::General, 600).await;
        let sweeper = sweeper_with(
            &h,
            SweepConfig {
                stuck_after: Duration::from_secs(60),
                batch_size: 1,
                ..SweepConfig::default()
            },
        );

        for _ in 0..2 {
            h.gateway
                .fail_next_create(GatewayError::timeout("mock", "deadline exceeded"))
                .await;
            let report = sweeper.sweep_once().await.unwrap();
            assert_eq!(report.examined, 1);
            assert_eq!(report.unresolved, 1);
        }

        assert_eq!(
            swept_keys(&h.gateway.calls().await),
            vec![
                format!("payment-{}", oldest.id),
                format!("payment-{}", newer.id)
            ]
        );
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let h = Harness::new();
        let sweeper = Arc::new(sweeper(&h));
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn({
            let sweeper = sweeper.clone();
            async move { sweeper.run(rx).await }
        });
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}

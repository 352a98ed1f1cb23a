//! Settlement repository port.
//!
//! One generic contract persists both payments and donations. Status
//! writes are compare-and-swap on the stored status so the processing
//! path and the webhook path can race without lost updates.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::payment::{Donation, PaymentRecord, PaymentStatus, Settleable};

/// Outcome of a conditional status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The stored status matched and the record was written.
    Applied,
    /// Another writer got there first; nothing was written.
    Conflict,
}

/// Repository port for settleable records.
#[async_trait]
pub trait SettlementRepository<T: Settleable>: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// - `DuplicateReference` if the provider reference (or enrollment) is taken
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, record: &T) -> Result<(), DomainError>;

    /// Find a record by id.
    async fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, DomainError>;

    /// Find the record whose provider reference equals `reference`.
    async fn find_by_reference(&self, reference: &str) -> Result<Option<T>, DomainError>;

    /// Write `record` only if the stored status is still `expected`.
    ///
    /// Persists status, provider reference and `updated_at`. A lost race
    /// is reported as `Conflict`, not as an error.
    async fn compare_and_set(
        &self,
        record: &T,
        expected: PaymentStatus,
    ) -> Result<TransitionOutcome, DomainError>;

    /// Records in `Processing` not touched since `before`.
    async fn find_stuck_processing(
        &self,
        before: Timestamp,
        limit: u32,
    ) -> Result<Vec<T>, DomainError>;
}

pub type PaymentRepository = dyn SettlementRepository<PaymentRecord>;
pub type DonationRepository = dyn SettlementRepository<Donation>;

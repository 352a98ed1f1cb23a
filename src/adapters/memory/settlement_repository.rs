//! In-memory settlement repository.
//!
//! Honours the same contract as the Postgres adapter: reference and
//! enrollment uniqueness, compare-and-swap status writes. Used by tests
//! and by `main` when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::payment::{PaymentStatus, Settleable};
use crate::ports::{SettlementRepository, TransitionOutcome};

pub struct InMemorySettlementRepository<T: Settleable> {
    records: RwLock<HashMap<T::Id, T>>,
}

impl<T: Settleable> Default for InMemorySettlementRepository<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Settleable> InMemorySettlementRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn not_found(id: &T::Id) -> DomainError {
        let code = if T::ENTITY == "donation" {
            ErrorCode::DonationNotFound
        } else {
            ErrorCode::PaymentNotFound
        };
        DomainError::new(code, format!("{} not found", T::ENTITY)).with_detail("id", id.to_string())
    }

    fn conflicts(existing: &T, candidate: &T) -> Option<DomainError> {
        if existing.id() == candidate.id() {
            return None;
        }
        if let (Some(a), Some(b)) = (existing.provider_reference(), candidate.provider_reference()) {
            if a == b {
                return Some(
                    DomainError::new(ErrorCode::DuplicateReference, "provider reference already in use")
                        .with_detail("reference", b),
                );
            }
        }
        if let (Some(a), Some(b)) = (existing.enrollment_id(), candidate.enrollment_id()) {
            if a == b {
                return Some(
                    DomainError::new(ErrorCode::DuplicateReference, "enrollment already has a payment")
                        .with_detail("reference", b.to_string()),
                );
            }
        }
        None
    }
}

#[async_trait]
impl<T: Settleable> SettlementRepository<T> for InMemorySettlementRepository<T> {
    async fn insert(&self, record: &T) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        if let Some(err) = records.values().find_map(|r| Self::conflicts(r, record)) {
            return Err(err);
        }
        records.insert(record.id(), record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, DomainError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<T>, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.provider_reference() == Some(reference))
            .cloned())
    }

    async fn compare_and_set(
        &self,
        record: &T,
        expected: PaymentStatus,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut records = self.records.write().await;
        let stored_status = records
            .get(&record.id())
            .map(|stored| stored.status())
            .ok_or_else(|| Self::not_found(&record.id()))?;

        if stored_status != expected {
            return Ok(TransitionOutcome::Conflict);
        }
        if let Some(err) = records.values().find_map(|r| Self::conflicts(r, record)) {
            return Err(err);
        }

        records.insert(record.id(), record.clone());
        Ok(TransitionOutcome::Applied)
    }

    async fn find_stuck_processing(
        &self,
        before: Timestamp,
        limit: u32,
    ) -> Result<Vec<T>, DomainError> {
        let mut stuck: Vec<T> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status() == PaymentStatus::Processing && r.updated_at().is_before(&before))
            .cloned()
            .collect();
        stuck.sort_by_key(|r| r.updated_at());
        stuck.truncate(limit as usize);
        Ok(stuck)
    }
}

//! GetRecordHandler - Query handler for a single payment or donation.

use std::sync::Arc;

use crate::domain::payment::{PaymentError, Settleable};
use crate::ports::SettlementRepository;

pub struct GetRecordHandler<T: Settleable> {
    repository: Arc<dyn SettlementRepository<T>>,
}

impl<T: Settleable> GetRecordHandler<T> {
    pub fn new(repository: Arc<dyn SettlementRepository<T>>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, id: &T::Id) -> Result<T, PaymentError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| PaymentError::not_found(T::ENTITY, id))
    }
}

//! PostgreSQL implementation of the donation settlement repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, DonationId, Timestamp};
use crate::domain::payment::{Donation, Donor, PaymentStatus};
use crate::ports::{SettlementRepository, TransitionOutcome};

use super::common::{map_write_error, parse_currency, parse_method, parse_status, read_error};

pub struct PostgresDonationRepository {
    pool: PgPool,
}

impl PostgresDonationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, donor_name, donor_email, amount, currency, amount_domestic, amount_foreign,
           method, provider_reference, status, notes, created_at, updated_at
    FROM donations
"#;

#[derive(Debug, sqlx::FromRow)]
struct DonationRow {
    id: Uuid,
    donor_name: Option<String>,
    donor_email: Option<String>,
    amount: Decimal,
    currency: String,
    amount_domestic: Decimal,
    amount_foreign: Decimal,
    method: String,
    provider_reference: Option<String>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DonationRow> for Donation {
    type Error = DomainError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        let donor = match (row.donor_name, row.donor_email) {
            (Some(name), Some(email)) => Some(Donor { name, email }),
            _ => None,
        };

        Ok(Donation {
            id: DonationId::from_uuid(row.id),
            donor,
            amount: row.amount,
            currency: parse_currency(&row.currency)?,
            amount_domestic: row.amount_domestic,
            amount_foreign: row.amount_foreign,
            method: parse_method(&row.method)?,
            provider_reference: row.provider_reference,
            status: parse_status(&row.status)?,
            notes: row.notes,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl SettlementRepository<Donation> for PostgresDonationRepository {
    async fn insert(&self, donation: &Donation) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO donations (
                id, donor_name, donor_email, amount, currency, amount_domestic, amount_foreign,
                method, provider_reference, status, notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(donation.id.as_uuid())
        .bind(donation.donor.as_ref().map(|d| d.name.clone()))
        .bind(donation.donor.as_ref().map(|d| d.email.clone()))
        .bind(donation.amount)
        .bind(donation.currency.code())
        .bind(donation.amount_domestic)
        .bind(donation.amount_foreign)
        .bind(donation.method.as_str())
        .bind(&donation.provider_reference)
        .bind(donation.status.as_str())
        .bind(&donation.notes)
        .bind(donation.created_at.as_datetime())
        .bind(donation.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "insert donation", donation.provider_reference.as_deref())
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &DonationId) -> Result<Option<Donation>, DomainError> {
        let row: Option<DonationRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(e, "find donation"))?;

        row.map(Donation::try_from).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Donation>, DomainError> {
        let row: Option<DonationRow> =
            sqlx::query_as(&format!("{} WHERE provider_reference = $1", SELECT_COLUMNS))
                .bind(reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| read_error(e, "find donation by reference"))?;

        row.map(Donation::try_from).transpose()
    }

    async fn compare_and_set(
        &self,
        donation: &Donation,
        expected: PaymentStatus,
    ) -> Result<TransitionOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE donations SET
                status = $2,
                provider_reference = $3,
                updated_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(donation.id.as_uuid())
        .bind(donation.status.as_str())
        .bind(&donation.provider_reference)
        .bind(donation.updated_at.as_datetime())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_write_error(e, "update donation status", donation.provider_reference.as_deref())
        })?;

        Ok(if result.rows_affected() == 0 {
            TransitionOutcome::Conflict
        } else {
            TransitionOutcome::Applied
        })
    }

    async fn find_stuck_processing(
        &self,
        before: Timestamp,
        limit: u32,
    ) -> Result<Vec<Donation>, DomainError> {
        let rows: Vec<DonationRow> = sqlx::query_as(&format!(
            "{} WHERE status = $1 AND updated_at < $2 ORDER BY updated_at LIMIT $3",
            SELECT_COLUMNS
        ))
        .bind(PaymentStatus::Processing.as_str())
        .bind(before.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error(e, "list stuck donations"))?;

        rows.into_iter().map(Donation::try_from).collect()
    }
}

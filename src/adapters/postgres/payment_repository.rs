//! PostgreSQL implementation of the payment settlement repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, EnrollmentId, PaymentId, Timestamp};
use crate::domain::payment::{PaymentKind, PaymentRecord, PaymentStatus};
use crate::ports::{SettlementRepository, TransitionOutcome};

use super::common::{map_write_error, parse_currency, parse_method, parse_status, read_error};

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, kind, enrollment_id, amount, currency, amount_domestic, amount_foreign,
           method, provider_reference, status, notes, receipt_ref, created_at, updated_at
    FROM payments
"#;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    kind: String,
    enrollment_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    amount_domestic: Decimal,
    amount_foreign: Decimal,
    method: String,
    provider_reference: String,
    status: String,
    notes: Option<String>,
    receipt_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let kind = match (row.kind.as_str(), row.enrollment_id) {
            ("general", None) => PaymentKind::General,
            ("enrollment", Some(id)) => PaymentKind::Enrollment {
                enrollment_id: EnrollmentId::from_uuid(id),
            },
            (kind, _) => {
                return Err(DomainError::database(format!(
                    "Inconsistent payment kind {} for {}",
                    kind, row.id
                )))
            }
        };

        Ok(PaymentRecord {
            id: PaymentId::from_uuid(row.id),
            kind,
            amount: row.amount,
            currency: parse_currency(&row.currency)?,
            amount_domestic: row.amount_domestic,
            amount_foreign: row.amount_foreign,
            method: parse_method(&row.method)?,
            provider_reference: row.provider_reference,
            status: parse_status(&row.status)?,
            notes: row.notes,
            receipt_ref: row.receipt_ref,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn kind_to_string(kind: &PaymentKind) -> &'static str {
    match kind {
        PaymentKind::General => "general",
        PaymentKind::Enrollment { .. } => "enrollment",
    }
}

#[async_trait]
impl SettlementRepository<PaymentRecord> for PostgresPaymentRepository {
    async fn insert(&self, record: &PaymentRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, kind, enrollment_id, amount, currency, amount_domestic, amount_foreign,
                method, provider_reference, status, notes, receipt_ref, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(kind_to_string(&record.kind))
        .bind(record.kind.enrollment_id().map(|e| *e.as_uuid()))
        .bind(record.amount)
        .bind(record.currency.code())
        .bind(record.amount_domestic)
        .bind(record.amount_foreign)
        .bind(record.method.as_str())
        .bind(&record.provider_reference)
        .bind(record.status.as_str())
        .bind(&record.notes)
        .bind(&record.receipt_ref)
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "insert payment", Some(&record.provider_reference)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(e, "find payment"))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("{} WHERE provider_reference = $1", SELECT_COLUMNS))
                .bind(reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| read_error(e, "find payment by reference"))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn compare_and_set(
        &self,
        record: &PaymentRecord,
        expected: PaymentStatus,
    ) -> Result<TransitionOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET
                status = $2,
                provider_reference = $3,
                updated_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.status.as_str())
        .bind(&record.provider_reference)
        .bind(record.updated_at.as_datetime())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "update payment status", Some(&record.provider_reference)))?;

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
    ) -> Result<Vec<PaymentRecord>, DomainError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            "{} WHERE status = $1 AND updated_at < $2 ORDER BY updated_at LIMIT $3",
            SELECT_COLUMNS
        ))
        .bind(PaymentStatus::Processing.as_str())
        .bind(before.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error(e, "list stuck payments"))?;

        rows.into_iter().map(PaymentRecord::try_from).collect()
    }
}

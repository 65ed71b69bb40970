use crate::{
    db::{
        errors::{DbError, Result},
        models::ledgers::{EntryType, LedgerEntryCreateDBRequest, LedgerEntryDBResponse, LedgerReference},
    },
    types::{LedgerEntryId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, FromRow, PgConnection};
use tracing::trace;
use uuid::Uuid;

// Database entity model for a ledger row
#[derive(Debug, Clone, FromRow)]
struct LedgerEntryRow {
    id: Uuid,
    user_id: UserId,
    entry_type: EntryType,
    amount: Decimal,
    balance_after: Decimal,
    reference_kind: Option<String>,
    reference_id: Option<Uuid>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<LedgerEntryRow> for LedgerEntryDBResponse {
    fn from(row: LedgerEntryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            entry_type: row.entry_type,
            amount: row.amount,
            balance_after: row.balance_after,
            reference: LedgerReference::from_columns(row.reference_kind.as_deref(), row.reference_id),
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// The credit accounting service. All balance mutations go through here;
/// the ledger is append-only and `users.credit_balance` is updated in the
/// same transaction as the entry insert.
pub struct Ledgers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Ledgers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Append a ledger entry and update the user's denormalized balance.
    /// Opens its own transaction; use [`Ledgers::apply_in`] to compose with
    /// an outer one.
    pub async fn create_entry(&mut self, request: &LedgerEntryCreateDBRequest) -> Result<LedgerEntryDBResponse> {
        let mut tx = self.db.begin().await?;
        let entry = Self::apply_in(&mut tx, request).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// The composable core: runs inside the caller's transaction so a
    /// settlement (webhook reconcile, task debit) commits atomically with
    /// its surrounding state changes.
    pub(crate) async fn apply_in(tx: &mut PgConnection, request: &LedgerEntryCreateDBRequest) -> Result<LedgerEntryDBResponse> {
        // Amounts are strictly positive; the sign lives in entry_type
        if request.amount <= Decimal::ZERO {
            return Err(DbError::InvalidAmount { amount: request.amount });
        }

        // Convert UUID to int64 for advisory lock
        // We use the first 8 bytes of the UUID as the lock key
        let user_uuid_bytes = request.user_id.as_bytes();
        let lock_key = i64::from_be_bytes([
            user_uuid_bytes[0],
            user_uuid_bytes[1],
            user_uuid_bytes[2],
            user_uuid_bytes[3],
            user_uuid_bytes[4],
            user_uuid_bytes[5],
            user_uuid_bytes[6],
            user_uuid_bytes[7],
        ]);

        // pg_advisory_xact_lock is transaction-scoped (auto-releases on
        // commit/rollback) and BLOCKS until available, serializing writers
        // per user.
        sqlx::query_scalar::<_, i32>("SELECT 1 FROM (SELECT pg_advisory_xact_lock($1)) AS _")
            .bind(lock_key)
            .fetch_one(&mut *tx)
            .await?;

        trace!("Acquired ledger lock for user_id {}", request.user_id);

        // Row lock on the user keeps the denormalized balance and the ledger
        // in lockstep even against writers that bypass the advisory lock.
        let current_balance = sqlx::query_scalar::<_, Decimal>("SELECT credit_balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(request.user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        let new_balance = match request.entry_type {
            EntryType::Credit => current_balance + request.amount,
            EntryType::Debit => current_balance - request.amount,
        };

        if new_balance < Decimal::ZERO {
            return Err(DbError::InsufficientBalance {
                requested: request.amount,
                available: current_balance,
            });
        }

        let row = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            INSERT INTO ledger_entries (user_id, entry_type, amount, balance_after, reference_kind, reference_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, entry_type, amount, balance_after, reference_kind, reference_id, description, created_at
            "#,
        )
        .bind(request.user_id)
        .bind(request.entry_type)
        .bind(request.amount)
        .bind(new_balance)
        .bind(request.reference.as_ref().map(|r| r.kind()))
        .bind(request.reference.as_ref().map(|r| r.id()))
        .bind(&request.description)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET credit_balance = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_balance)
            .bind(request.user_id)
            .execute(&mut *tx)
            .await?;

        Ok(LedgerEntryDBResponse::from(row))
    }

    /// Current balance for a user, read from the denormalized column.
    /// Read-only, no locking.
    pub async fn get_user_balance(&mut self, user_id: UserId) -> Result<Decimal> {
        sqlx::query_scalar::<_, Decimal>("SELECT credit_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)
    }

    /// List entries for a specific user with pagination
    pub async fn list_user_entries(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<LedgerEntryDBResponse>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, user_id, entry_type, amount, balance_after, reference_kind, reference_id, description, created_at
            FROM ledger_entries
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(LedgerEntryDBResponse::from).collect())
    }

    /// List all entries across all users (admin view)
    pub async fn list_all_entries(&mut self, skip: i64, limit: i64) -> Result<Vec<LedgerEntryDBResponse>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, user_id, entry_type, amount, balance_after, reference_kind, reference_id, description, created_at
            FROM ledger_entries
            ORDER BY created_at DESC, id DESC
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(LedgerEntryDBResponse::from).collect())
    }

    /// Get a single entry by its ID
    pub async fn get_entry_by_id(&mut self, entry_id: LedgerEntryId) -> Result<Option<LedgerEntryDBResponse>> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(
            r#"
            SELECT id, user_id, entry_type, amount, balance_after, reference_kind, reference_id, description, created_at
            FROM ledger_entries
            WHERE id = $1
            "#,
        )
        .bind(entry_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(LedgerEntryDBResponse::from))
    }
}

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::Ledgers,
        models::{
            ledgers::{EntryType, LedgerEntryCreateDBRequest, LedgerEntryDBResponse, LedgerReference},
            payment_sessions::{PaymentSessionCreateDBRequest, PaymentSessionDBResponse, SessionStatus},
        },
    },
    types::{PaymentSessionId, PlanId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Connection, FromRow, PgConnection};
use tracing::info;

#[derive(Debug, Clone, FromRow)]
struct PaymentSessionRow {
    id: PaymentSessionId,
    user_id: UserId,
    plan_id: PlanId,
    external_session_id: String,
    amount: Decimal,
    status: SessionStatus,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentSessionRow> for PaymentSessionDBResponse {
    fn from(row: PaymentSessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            plan_id: row.plan_id,
            external_session_id: row.external_session_id,
            amount: row.amount,
            status: row.status,
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, plan_id, external_session_id, amount, status, processed_at, created_at, updated_at";

/// Outcome of a webhook reconciliation attempt, keyed on the external
/// session id (the idempotency key).
#[derive(Debug)]
pub enum ConfirmOutcome {
    /// First delivery: the session moved to succeeded and credits landed.
    Credited(LedgerEntryDBResponse),
    /// Redelivery of an already-settled session. No-op.
    AlreadyProcessed,
    /// No session with that external id. The caller logs and acknowledges.
    NotFound,
}

pub struct PaymentSessions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PaymentSessions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Persist the pending row. Called BEFORE the redirect URL is handed to
    /// the client, so a webhook can never race an unrecorded session.
    pub async fn create(&mut self, request: &PaymentSessionCreateDBRequest) -> Result<PaymentSessionDBResponse> {
        let row = sqlx::query_as::<_, PaymentSessionRow>(&format!(
            r#"
            INSERT INTO payment_sessions (user_id, plan_id, external_session_id, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.plan_id)
        .bind(&request.external_session_id)
        .bind(request.amount)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(PaymentSessionDBResponse::from(row))
    }

    pub async fn get_by_id(&mut self, session_id: PaymentSessionId) -> Result<Option<PaymentSessionDBResponse>> {
        let row = sqlx::query_as::<_, PaymentSessionRow>(&format!("SELECT {SESSION_COLUMNS} FROM payment_sessions WHERE id = $1"))
            .bind(session_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row.map(PaymentSessionDBResponse::from))
    }

    pub async fn get_by_external_id(&mut self, external_session_id: &str) -> Result<Option<PaymentSessionDBResponse>> {
        let row = sqlx::query_as::<_, PaymentSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM payment_sessions WHERE external_session_id = $1"
        ))
        .bind(external_session_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(row.map(PaymentSessionDBResponse::from))
    }

    pub async fn list(&mut self, user_id: Option<UserId>, skip: i64, limit: i64) -> Result<Vec<PaymentSessionDBResponse>> {
        let rows = sqlx::query_as::<_, PaymentSessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM payment_sessions
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            OFFSET $2
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows.into_iter().map(PaymentSessionDBResponse::from).collect())
    }

    /// Move a session to a non-success terminal state (failed, canceled).
    pub async fn transition(&mut self, session_id: PaymentSessionId, to: SessionStatus) -> Result<PaymentSessionDBResponse> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, PaymentSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM payment_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        if !row.status.can_transition(to) {
            return Err(DbError::InvalidTransition {
                entity: "payment session",
                from: row.status.to_string(),
                to: to.to_string(),
            });
        }

        let updated = sqlx::query_as::<_, PaymentSessionRow>(&format!(
            "UPDATE payment_sessions SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {SESSION_COLUMNS}"
        ))
        .bind(session_id)
        .bind(to)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(PaymentSessionDBResponse::from(updated))
    }

    /// Reconcile a completed checkout: transition to succeeded, assign the
    /// plan, and credit the plan's credits, all in one transaction.
    /// Redeliveries hit the already-succeeded row and return without a
    /// second ledger entry.
    pub async fn confirm_succeeded(&mut self, external_session_id: &str) -> Result<ConfirmOutcome> {
        let mut tx = self.db.begin().await?;

        let session = sqlx::query_as::<_, PaymentSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM payment_sessions WHERE external_session_id = $1 FOR UPDATE"
        ))
        .bind(external_session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session) = session else {
            return Ok(ConfirmOutcome::NotFound);
        };

        if session.status == SessionStatus::Succeeded {
            return Ok(ConfirmOutcome::AlreadyProcessed);
        }

        if !session.status.can_transition(SessionStatus::Succeeded) {
            return Err(DbError::InvalidTransition {
                entity: "payment session",
                from: session.status.to_string(),
                to: SessionStatus::Succeeded.to_string(),
            });
        }

        sqlx::query("UPDATE payment_sessions SET status = 'succeeded', processed_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(session.id)
            .execute(&mut *tx)
            .await?;

        let (plan_credits, plan_name) = sqlx::query_as::<_, (Decimal, String)>("SELECT credits, name FROM plans WHERE id = $1")
            .bind(session.plan_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        sqlx::query("UPDATE users SET plan_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(session.plan_id)
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?;

        let entry = Ledgers::apply_in(
            &mut tx,
            &LedgerEntryCreateDBRequest {
                user_id: session.user_id,
                entry_type: EntryType::Credit,
                amount: plan_credits,
                reference: Some(LedgerReference::PaymentSession(session.id)),
                description: Some(format!("Purchase of plan {plan_name}")),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            credits = %plan_credits,
            "payment session reconciled"
        );

        Ok(ConfirmOutcome::Credited(entry))
    }
}

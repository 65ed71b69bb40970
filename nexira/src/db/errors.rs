use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Errors surfaced by the repository layer. Postgres constraint violations
/// are classified here so handlers can map them to API responses without
/// string-matching on sqlx errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String },

    /// Raised by the ledger_entries immutability trigger.
    #[error("immutable record: {message}")]
    ImmutableRecord { message: String },

    /// Non-positive amount handed to the accounting service. Checked before
    /// any lock is taken; CHECK (amount > 0) on the table is the backstop.
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    /// Debit would take the balance below zero. Checked in code before the
    /// insert; the CHECK constraint on users.credit_balance is the backstop.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Decimal, available: Decimal },

    /// An illegal status change was attempted on a state-machine column.
    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    return DbError::UniqueViolation {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    }
                }
                Some("23514") => {
                    return DbError::CheckViolation {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    }
                }
                // P0001 is RAISE EXCEPTION; the only trigger we install guards
                // the ledger.
                Some("P0001") if db_err.message().contains("immutable") => {
                    return DbError::ImmutableRecord {
                        message: db_err.message().to_string(),
                    }
                }
                _ => {}
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return DbError::NotFound;
        }
        DbError::Sqlx(err)
    }
}

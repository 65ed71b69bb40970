use crate::{
    db::errors::DbError,
    types::{Operation, Permission},
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("insufficient permissions to {action} {resource}")]
    InsufficientPermissions {
        required: Permission,
        action: Operation,
        resource: String,
    },

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: Decimal, available: Decimal },

    #[error("invalid webhook signature")]
    InvalidWebhookSignature,

    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("upstream service failure: {message}")]
    ExternalService { message: String },

    #[error("database error: {0}")]
    Database(DbError),
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidAmount { .. } => Error::InvalidAmount,
            DbError::InsufficientBalance { requested, available } => Error::InsufficientCredits {
                required: requested,
                available,
            },
            DbError::InvalidTransition { entity, from, to } => Error::InvalidTransition { entity, from, to },
            other => Error::Database(other),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::Unauthorized { message } => (StatusCode::UNAUTHORIZED, message.clone()),
            Error::InsufficientPermissions { action, resource, .. } => (
                StatusCode::FORBIDDEN,
                format!("Insufficient permissions to {action} {resource}"),
            ),
            Error::NotFound { resource, id } => (StatusCode::NOT_FOUND, format!("{resource} {id} not found")),
            Error::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            Error::InvalidAmount => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::InsufficientCredits { .. } => (StatusCode::PAYMENT_REQUIRED, self.to_string()),
            Error::InvalidWebhookSignature => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::InvalidTransition { .. } => (StatusCode::CONFLICT, self.to_string()),
            Error::ExternalService { message } => (StatusCode::BAD_GATEWAY, message.clone()),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
                DbError::UniqueViolation { .. } => (StatusCode::CONFLICT, "Resource already exists".to_string()),
                DbError::CheckViolation { .. } => (StatusCode::BAD_REQUEST, "Constraint violation".to_string()),
                other => {
                    error!("Database error: {other}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

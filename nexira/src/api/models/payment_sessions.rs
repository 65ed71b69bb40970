use crate::db::models::payment_sessions::{PaymentSessionDBResponse, SessionStatus};
use crate::types::{PaymentSessionId, PlanId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[schema(value_type = String, format = "uuid")]
    pub plan_id: PlanId,
    /// Where the gateway redirects after payment
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    #[schema(value_type = String, format = "uuid")]
    pub session_id: PaymentSessionId,
    /// Hosted checkout page to redirect the user to
    pub checkout_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentSessionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentSessionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub plan_id: PlanId,
    pub external_session_id: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub status: SessionStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentSessionDBResponse> for PaymentSessionResponse {
    fn from(db: PaymentSessionDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            plan_id: db.plan_id,
            external_session_id: db.external_session_id,
            amount: db.amount,
            status: db.status,
            processed_at: db.processed_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Acknowledgement body returned to the gateway for every accepted delivery
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

/// Query parameters for listing payment sessions
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListPaymentSessionsQuery {
    /// Restrict to one user (admins only; defaults to the caller)
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<Uuid>)]
    pub user_id: Option<UserId>,

    /// Number of items to skip
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of items to return
    #[param(default = 100, minimum = 1, maximum = 1000)]
    pub limit: Option<i64>,
}

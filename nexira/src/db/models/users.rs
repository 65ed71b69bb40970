use crate::{
    api::models::users::Role,
    types::{PlanId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub role: Role,
    pub referred_by: Option<UserId>,
}

/// Database request for updating a user (None = leave unchanged)
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
    pub is_verified: Option<bool>,
}

/// Database response for a user row
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub role: Role,
    pub referral_code: Option<String>,
    pub referred_by: Option<UserId>,
    pub credit_balance: Decimal,
    pub plan_id: Option<PlanId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

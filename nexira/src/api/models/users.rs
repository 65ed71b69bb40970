use crate::auth::token;
use crate::db::{handlers::Users, models::users::UserDBResponse};
use crate::errors::Error;
use crate::types::{PlanId, UserId};
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// Role enum, stored as text on the users row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

// User request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Admin only
    pub role: Option<Role>,
    /// Admin only
    pub is_verified: Option<bool>,
}

// User response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_verified: bool,
    pub role: Role,
    pub referral_code: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub referred_by: Option<UserId>,
    #[schema(value_type = String)]
    pub credit_balance: Decimal,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub plan_id: Option<PlanId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query parameters for listing users
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersQuery {
    /// Number of items to skip
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of items to return
    #[param(default = 100, minimum = 1, maximum = 1000)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[schema(value_type = String)]
    pub balance: Decimal,
}

/// Public view of a referral code lookup. Deliberately minimal so codes
/// cannot be used to enumerate account details.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReferrerResponse {
    pub referral_code: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            role: db.role,
            display_name: db.display_name,
            avatar_url: db.avatar_url,
        }
    }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            display_name: db.display_name,
            avatar_url: db.avatar_url,
            is_verified: db.is_verified,
            role: db.role,
            referral_code: db.referral_code,
            referred_by: db.referred_by,
            credit_balance: db.credit_balance,
            plan_id: db.plan_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::Unauthorized {
                message: "missing authorization header".to_string(),
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| Error::Unauthorized {
            message: "authorization header is not a bearer token".to_string(),
        })?;

        let claims = token::verify(&state.config.auth, token)?;

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut users = Users::new(&mut conn);
        let user = users
            .get_by_id(claims.sub)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::Unauthorized {
                message: "token subject no longer exists".to_string(),
            })?;

        Ok(CurrentUser::from(user))
    }
}

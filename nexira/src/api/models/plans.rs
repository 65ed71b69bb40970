use crate::db::models::plans::PlanDBResponse;
use crate::types::{PlanId, PriceBookId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanCreate {
    #[schema(value_type = String, format = "uuid")]
    pub price_book_id: PriceBookId,
    pub name: String,
    /// Fiat price in the account currency
    #[schema(value_type = String)]
    pub price: Decimal,
    /// Credits granted on purchase
    #[schema(value_type = String)]
    pub credits: Decimal,
    /// Gateway price identifier used at checkout
    pub external_price_id: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanUpdate {
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub credits: Option<Decimal>,
    pub external_price_id: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PlanId,
    #[schema(value_type = String, format = "uuid")]
    pub price_book_id: PriceBookId,
    pub name: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = String)]
    pub credits: Decimal,
    pub external_price_id: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanDBResponse> for PlanResponse {
    fn from(db: PlanDBResponse) -> Self {
        Self {
            id: db.id,
            price_book_id: db.price_book_id,
            name: db.name,
            price: db.price,
            credits: db.credits,
            external_price_id: db.external_price_id,
            description: db.description,
            is_active: db.is_active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing plans
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListPlansQuery {
    /// Restrict to one catalog version
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<Uuid>)]
    pub price_book_id: Option<PriceBookId>,

    /// Number of items to skip
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of items to return
    #[param(default = 100, minimum = 1, maximum = 1000)]
    pub limit: Option<i64>,
}

use crate::types::{PlanId, PriceBookId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Database request for creating a plan
#[derive(Debug, Clone)]
pub struct PlanCreateDBRequest {
    pub price_book_id: PriceBookId,
    pub name: String,
    pub price: Decimal,
    pub credits: Decimal,
    pub external_price_id: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Database request for updating a plan (None = leave unchanged)
#[derive(Debug, Clone, Default)]
pub struct PlanUpdateDBRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub credits: Option<Decimal>,
    pub external_price_id: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Database response for a plan row
#[derive(Debug, Clone)]
pub struct PlanDBResponse {
    pub id: PlanId,
    pub price_book_id: PriceBookId,
    pub name: String,
    pub price: Decimal,
    pub credits: Decimal,
    pub external_price_id: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

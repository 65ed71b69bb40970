use crate::types::PriceBookId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Database request for creating a price book version
#[derive(Debug, Clone)]
pub struct PriceBookCreateDBRequest {
    pub version_tag: String,
    pub price_per_credit: Decimal,
    pub effective_from: DateTime<Utc>,
    pub terms_of_service: String,
}

/// Database request for updating a price book (None = leave unchanged)
#[derive(Debug, Clone, Default)]
pub struct PriceBookUpdateDBRequest {
    pub price_per_credit: Option<Decimal>,
    pub effective_from: Option<DateTime<Utc>>,
    pub terms_of_service: Option<String>,
}

/// Database response for a price book row
#[derive(Debug, Clone)]
pub struct PriceBookDBResponse {
    pub id: PriceBookId,
    pub version_tag: String,
    pub price_per_credit: Decimal,
    pub effective_from: DateTime<Utc>,
    pub terms_of_service: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

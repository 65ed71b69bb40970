use crate::db::models::price_books::PriceBookDBResponse;
use crate::types::PriceBookId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceBookCreate {
    /// Human-readable version identifier, unique across books
    pub version_tag: String,
    #[schema(value_type = String)]
    pub price_per_credit: Decimal,
    /// When this version takes effect. Defaults to now.
    pub effective_from: Option<DateTime<Utc>>,
    pub terms_of_service: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceBookUpdate {
    #[schema(value_type = Option<String>)]
    pub price_per_credit: Option<Decimal>,
    pub effective_from: Option<DateTime<Utc>>,
    pub terms_of_service: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PriceBookResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PriceBookId,
    pub version_tag: String,
    #[schema(value_type = String)]
    pub price_per_credit: Decimal,
    pub effective_from: DateTime<Utc>,
    pub terms_of_service: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PriceBookDBResponse> for PriceBookResponse {
    fn from(db: PriceBookDBResponse) -> Self {
        Self {
            id: db.id,
            version_tag: db.version_tag,
            price_per_credit: db.price_per_credit,
            effective_from: db.effective_from,
            terms_of_service: db.terms_of_service,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing price books
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListPriceBooksQuery {
    /// Number of items to skip
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of items to return
    #[param(default = 100, minimum = 1, maximum = 1000)]
    pub limit: Option<i64>,
}

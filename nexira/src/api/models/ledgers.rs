use crate::db::models::ledgers::{EntryType, LedgerEntryDBResponse, LedgerReference};
use crate::types::{LedgerEntryId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Admin request to post a manual adjustment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntryCreate {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub entry_type: EntryType,
    /// Positive credit amount
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntryResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LedgerEntryId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub entry_type: EntryType,
    #[schema(value_type = String)]
    pub amount: Decimal,
    /// Balance immediately after this entry was applied
    #[schema(value_type = String)]
    pub balance_after: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<LedgerReference>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntryDBResponse> for LedgerEntryResponse {
    fn from(db: LedgerEntryDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            entry_type: db.entry_type,
            amount: db.amount,
            balance_after: db.balance_after,
            reference: db.reference,
            description: db.description,
            created_at: db.created_at,
        }
    }
}

/// Query parameters for listing ledger entries
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListLedgerEntriesQuery {
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

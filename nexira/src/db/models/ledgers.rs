use crate::types::{LedgerEntryId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Ledger entry type stored as TEXT in database
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Credit,
    Debit,
}

/// What a ledger entry settles against. Stored as a (reference_kind,
/// reference_id) column pair; both NULL for manual admin entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LedgerReference {
    EnhancementTask(Uuid),
    PaymentSession(Uuid),
    Referral(Uuid),
}

impl LedgerReference {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerReference::EnhancementTask(_) => "enhancement_task",
            LedgerReference::PaymentSession(_) => "payment_session",
            LedgerReference::Referral(_) => "referral",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LedgerReference::EnhancementTask(id) | LedgerReference::PaymentSession(id) | LedgerReference::Referral(id) => *id,
        }
    }

    pub fn from_columns(kind: Option<&str>, id: Option<Uuid>) -> Option<Self> {
        match (kind, id) {
            (Some("enhancement_task"), Some(id)) => Some(LedgerReference::EnhancementTask(id)),
            (Some("payment_session"), Some(id)) => Some(LedgerReference::PaymentSession(id)),
            (Some("referral"), Some(id)) => Some(LedgerReference::Referral(id)),
            _ => None,
        }
    }
}

/// Database request for appending a ledger entry
#[derive(Debug, Clone)]
pub struct LedgerEntryCreateDBRequest {
    pub user_id: UserId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub reference: Option<LedgerReference>,
    pub description: Option<String>,
}

/// Database response for a ledger entry
#[derive(Debug, Clone)]
pub struct LedgerEntryDBResponse {
    pub id: LedgerEntryId,
    pub user_id: UserId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference: Option<LedgerReference>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_column_round_trip() {
        let id = Uuid::new_v4();
        for reference in [
            LedgerReference::EnhancementTask(id),
            LedgerReference::PaymentSession(id),
            LedgerReference::Referral(id),
        ] {
            let restored = LedgerReference::from_columns(Some(reference.kind()), Some(reference.id()));
            assert_eq!(restored, Some(reference));
        }
    }

    #[test]
    fn test_reference_requires_both_columns() {
        assert_eq!(LedgerReference::from_columns(None, Some(Uuid::new_v4())), None);
        assert_eq!(LedgerReference::from_columns(Some("referral"), None), None);
        assert_eq!(LedgerReference::from_columns(Some("bogus"), Some(Uuid::new_v4())), None);
    }
}

use crate::types::{ImageTaskId, PriceBookId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Enhancement task lifecycle, stored as TEXT in database.
///
/// pending -> processing -> completed | failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn can_transition(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, Processing) | (Pending, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Database request for creating an enhancement task
#[derive(Debug, Clone)]
pub struct ImageTaskCreateDBRequest {
    pub user_id: UserId,
    pub status: TaskStatus,
    pub cost: Decimal,
    /// Snapshot of the generation options as submitted.
    pub config: serde_json::Value,
    pub price_snapshot_id: PriceBookId,
}

/// Database response for an enhancement task row
#[derive(Debug, Clone)]
pub struct ImageTaskDBResponse {
    pub id: ImageTaskId,
    pub user_id: UserId,
    pub status: TaskStatus,
    pub cost: Decimal,
    pub config: serde_json::Value,
    pub price_snapshot_id: PriceBookId,
    pub output_ref: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use crate::types::{PaymentSessionId, PlanId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Payment session lifecycle, stored as TEXT in database.
///
/// pending -> processing -> succeeded | failed
/// pending -> succeeded | failed | canceled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl SessionStatus {
    /// Legal state-machine moves. Terminal states admit nothing.
    pub fn can_transition(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (Pending, Processing) | (Pending, Succeeded) | (Pending, Failed) | (Pending, Canceled)
                | (Processing, Succeeded)
                | (Processing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Succeeded | SessionStatus::Failed | SessionStatus::Canceled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Processing => "processing",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
            SessionStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// Database request for persisting a checkout session
#[derive(Debug, Clone)]
pub struct PaymentSessionCreateDBRequest {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub external_session_id: String,
    pub amount: Decimal,
}

/// Database response for a payment session row
#[derive(Debug, Clone)]
pub struct PaymentSessionDBResponse {
    pub id: PaymentSessionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub external_session_id: String,
    pub amount: Decimal,
    pub status: SessionStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::SessionStatus::*;

    #[test]
    fn test_pending_transitions() {
        assert!(Pending.can_transition(Processing));
        assert!(Pending.can_transition(Succeeded));
        assert!(Pending.can_transition(Failed));
        assert!(Pending.can_transition(Canceled));
        assert!(!Pending.can_transition(Pending));
    }

    #[test]
    fn test_processing_transitions() {
        assert!(Processing.can_transition(Succeeded));
        assert!(Processing.can_transition(Failed));
        assert!(!Processing.can_transition(Pending));
        assert!(!Processing.can_transition(Canceled));
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        for terminal in [Succeeded, Failed, Canceled] {
            assert!(terminal.is_terminal());
            for target in [Pending, Processing, Succeeded, Failed, Canceled] {
                assert!(!terminal.can_transition(target));
            }
        }
    }
}

use crate::{
    api::models::{
        ledgers::{LedgerEntryCreate, LedgerEntryResponse, ListLedgerEntriesQuery},
        users::{BalanceResponse, CurrentUser},
    },
    auth::permissions::{self, operation, resource, RequiresPermission},
    db::{handlers::Ledgers, models::ledgers::LedgerEntryCreateDBRequest},
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Post a manual ledger adjustment
#[utoipa::path(
    post,
    path = "/ledger/entries",
    tag = "ledger",
    summary = "Create a ledger entry",
    description = "Post a manual credit or debit against a user's balance (admin only)",
    request_body = LedgerEntryCreate,
    responses(
        (status = 201, description = "Entry created successfully", body = LedgerEntryResponse),
        (status = 400, description = "Bad request - invalid amount"),
        (status = 401, description = "Unauthorized"),
        (status = 402, description = "Insufficient credits for the debit"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_ledger_entry(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::Ledgers, operation::CreateAll>,
    Json(data): Json<LedgerEntryCreate>,
) -> Result<(StatusCode, Json<LedgerEntryResponse>)> {
    if data.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount);
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut ledgers = Ledgers::new(&mut pool_conn);

    let entry = ledgers
        .create_entry(&LedgerEntryCreateDBRequest {
            user_id: data.user_id,
            entry_type: data.entry_type,
            amount: data.amount,
            reference: None,
            description: data.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(LedgerEntryResponse::from(entry))))
}

/// Get a specific ledger entry
#[utoipa::path(
    get,
    path = "/ledger/entries/{entry_id}",
    tag = "ledger",
    summary = "Get a ledger entry",
    description = "Get one ledger entry. Users can only access entries on their own account.",
    params(
        ("entry_id" = String, Path, description = "Ledger entry ID"),
    ),
    responses(
        (status = 200, description = "Entry details", body = LedgerEntryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Entry not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_ledger_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
    current_user: CurrentUser,
) -> Result<Json<LedgerEntryResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut ledgers = Ledgers::new(&mut pool_conn);

    let has_read_all = permissions::has_permission(&current_user, Resource::Ledgers, Operation::ReadAll);

    let entry = ledgers.get_entry_by_id(entry_id).await?;
    let entry = match entry {
        Some(entry) => {
            if !has_read_all && entry.user_id != current_user.id {
                // Return 404 to avoid leaking existence
                return Err(Error::NotFound {
                    resource: "Ledger entry".to_string(),
                    id: entry_id.to_string(),
                });
            }
            entry
        }
        None => {
            return Err(Error::NotFound {
                resource: "Ledger entry".to_string(),
                id: entry_id.to_string(),
            });
        }
    };

    Ok(Json(LedgerEntryResponse::from(entry)))
}

/// List ledger entries
#[utoipa::path(
    get,
    path = "/ledger/entries",
    tag = "ledger",
    summary = "List ledger entries",
    description = "List ledger entries, newest first. Users see their own; admins can filter by user or see all.",
    params(
        ListLedgerEntriesQuery
    ),
    responses(
        (status = 200, description = "List of entries", body = [LedgerEntryResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - cannot access other users' entries"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_ledger_entries(
    State(state): State<AppState>,
    Query(query): Query<ListLedgerEntriesQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<LedgerEntryResponse>>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);

    let has_read_all = permissions::has_permission(&current_user, Resource::Ledgers, Operation::ReadAll);

    let filter_user_id = match query.user_id {
        Some(requested_user_id) => {
            if !has_read_all && requested_user_id != current_user.id {
                return Err(Error::InsufficientPermissions {
                    required: Permission::Allow(Resource::Ledgers, Operation::ReadAll),
                    action: Operation::ReadAll,
                    resource: "ledger entries".to_string(),
                });
            }
            Some(requested_user_id)
        }
        None => {
            if has_read_all {
                None
            } else {
                Some(current_user.id)
            }
        }
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut ledgers = Ledgers::new(&mut pool_conn);

    let entries = if let Some(user_id) = filter_user_id {
        ledgers.list_user_entries(user_id, skip, limit).await?
    } else {
        ledgers.list_all_entries(skip, limit).await?
    };

    Ok(Json(entries.into_iter().map(LedgerEntryResponse::from).collect()))
}

/// Get the caller's credit balance
#[utoipa::path(
    get,
    path = "/ledger/balance",
    tag = "ledger",
    summary = "Get credit balance",
    description = "Get the caller's current credit balance",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_balance(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<BalanceResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut ledgers = Ledgers::new(&mut pool_conn);

    let balance = ledgers.get_user_balance(current_user.id).await?;
    Ok(Json(BalanceResponse {
        user_id: current_user.id,
        balance,
    }))
}

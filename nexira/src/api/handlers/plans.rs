use crate::{
    api::models::plans::{ListPlansQuery, PlanCreate, PlanResponse, PlanUpdate},
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::Plans,
        models::plans::{PlanCreateDBRequest, PlanUpdateDBRequest},
    },
    errors::{Error, Result},
    types::PlanId,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;

/// Create a plan
#[utoipa::path(
    post,
    path = "/plans",
    tag = "plans",
    summary = "Create a plan",
    description = "Add a plan to a catalog version (admin only)",
    request_body = PlanCreate,
    responses(
        (status = 201, description = "Plan created", body = PlanResponse),
        (status = 400, description = "Bad request - invalid price or credits"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 404, description = "Price book not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_plan(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::Plans, operation::CreateAll>,
    Json(data): Json<PlanCreate>,
) -> Result<(StatusCode, Json<PlanResponse>)> {
    if data.price < Decimal::ZERO || data.credits <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "price must be non-negative and credits positive".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut plans = Plans::new(&mut pool_conn);

    let plan = plans
        .create(&PlanCreateDBRequest {
            price_book_id: data.price_book_id,
            name: data.name,
            price: data.price,
            credits: data.credits,
            external_price_id: data.external_price_id,
            description: data.description,
            is_active: data.is_active,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PlanResponse::from(plan))))
}

/// Get a plan
#[utoipa::path(
    get,
    path = "/plans/{plan_id}",
    tag = "plans",
    summary = "Get a plan",
    params(
        ("plan_id" = String, Path, description = "Plan ID"),
    ),
    responses(
        (status = 200, description = "Plan details", body = PlanResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Plan not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<PlanId>,
    _perm: RequiresPermission<resource::Plans, operation::ReadAll>,
) -> Result<Json<PlanResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut plans = Plans::new(&mut pool_conn);

    let plan = plans.get_by_id(plan_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Plan".to_string(),
        id: plan_id.to_string(),
    })?;

    Ok(Json(PlanResponse::from(plan)))
}

/// List plans
#[utoipa::path(
    get,
    path = "/plans",
    tag = "plans",
    summary = "List plans",
    description = "List plans, optionally restricted to one catalog version",
    params(
        ListPlansQuery
    ),
    responses(
        (status = 200, description = "List of plans", body = [PlanResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_plans(
    State(state): State<AppState>,
    Query(query): Query<ListPlansQuery>,
    _perm: RequiresPermission<resource::Plans, operation::ReadAll>,
) -> Result<Json<Vec<PlanResponse>>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut plans = Plans::new(&mut pool_conn);

    let all = plans.list(query.price_book_id, skip, limit).await?;
    Ok(Json(all.into_iter().map(PlanResponse::from).collect()))
}

/// Update a plan
#[utoipa::path(
    patch,
    path = "/plans/{plan_id}",
    tag = "plans",
    summary = "Update a plan",
    description = "Update plan fields (admin only)",
    params(
        ("plan_id" = String, Path, description = "Plan ID"),
    ),
    request_body = PlanUpdate,
    responses(
        (status = 200, description = "Updated plan", body = PlanResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 404, description = "Plan not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<PlanId>,
    _perm: RequiresPermission<resource::Plans, operation::UpdateAll>,
    Json(data): Json<PlanUpdate>,
) -> Result<Json<PlanResponse>> {
    if data.credits.is_some_and(|c| c <= Decimal::ZERO) || data.price.is_some_and(|p| p < Decimal::ZERO) {
        return Err(Error::BadRequest {
            message: "price must be non-negative and credits positive".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut plans = Plans::new(&mut pool_conn);

    let updated = plans
        .update(
            plan_id,
            &PlanUpdateDBRequest {
                name: data.name,
                price: data.price,
                credits: data.credits,
                external_price_id: data.external_price_id,
                description: data.description,
                is_active: data.is_active,
            },
        )
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Plan".to_string(),
            id: plan_id.to_string(),
        })?;

    Ok(Json(PlanResponse::from(updated)))
}

/// Delete a plan
#[utoipa::path(
    delete,
    path = "/plans/{plan_id}",
    tag = "plans",
    summary = "Delete a plan",
    description = "Remove a plan from the catalog (admin only). Prefer deactivating plans that have been sold.",
    params(
        ("plan_id" = String, Path, description = "Plan ID"),
    ),
    responses(
        (status = 204, description = "Plan deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 404, description = "Plan not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<PlanId>,
    _perm: RequiresPermission<resource::Plans, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut plans = Plans::new(&mut pool_conn);

    if !plans.delete(plan_id).await? {
        return Err(Error::NotFound {
            resource: "Plan".to_string(),
            id: plan_id.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

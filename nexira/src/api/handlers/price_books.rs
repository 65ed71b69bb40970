use crate::{
    api::models::price_books::{ListPriceBooksQuery, PriceBookCreate, PriceBookResponse, PriceBookUpdate},
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::PriceBooks,
        models::price_books::{PriceBookCreateDBRequest, PriceBookUpdateDBRequest},
    },
    errors::{Error, Result},
    types::PriceBookId,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use rust_decimal::Decimal;

/// Create a price book version
#[utoipa::path(
    post,
    path = "/price-books",
    tag = "price-books",
    summary = "Create a price book",
    description = "Publish a new catalog version (admin only). Existing versions are never edited in place for repricing; publish a new version instead.",
    request_body = PriceBookCreate,
    responses(
        (status = 201, description = "Price book created", body = PriceBookResponse),
        (status = 400, description = "Bad request - invalid price per credit"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 409, description = "Version tag already exists"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_price_book(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::PriceBooks, operation::CreateAll>,
    Json(data): Json<PriceBookCreate>,
) -> Result<(StatusCode, Json<PriceBookResponse>)> {
    if data.price_per_credit <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "price_per_credit must be positive".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut books = PriceBooks::new(&mut pool_conn);

    let book = books
        .create(&PriceBookCreateDBRequest {
            version_tag: data.version_tag,
            price_per_credit: data.price_per_credit,
            effective_from: data.effective_from.unwrap_or_else(Utc::now),
            terms_of_service: data.terms_of_service.unwrap_or_default(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PriceBookResponse::from(book))))
}

/// Get the price book currently in force
#[utoipa::path(
    get,
    path = "/price-books/current",
    tag = "price-books",
    summary = "Get the current price book",
    description = "The catalog version in force right now: the latest effective_from not in the future",
    responses(
        (status = 200, description = "Current price book", body = PriceBookResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No price book is in force"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_current_price_book(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::PriceBooks, operation::ReadAll>,
) -> Result<Json<PriceBookResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut books = PriceBooks::new(&mut pool_conn);

    let book = books.current().await?.ok_or_else(|| Error::NotFound {
        resource: "Price book".to_string(),
        id: "current".to_string(),
    })?;

    Ok(Json(PriceBookResponse::from(book)))
}

/// Get a price book
#[utoipa::path(
    get,
    path = "/price-books/{price_book_id}",
    tag = "price-books",
    summary = "Get a price book",
    params(
        ("price_book_id" = String, Path, description = "Price book ID"),
    ),
    responses(
        (status = 200, description = "Price book details", body = PriceBookResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Price book not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_price_book(
    State(state): State<AppState>,
    Path(price_book_id): Path<PriceBookId>,
    _perm: RequiresPermission<resource::PriceBooks, operation::ReadAll>,
) -> Result<Json<PriceBookResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut books = PriceBooks::new(&mut pool_conn);

    let book = books.get_by_id(price_book_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Price book".to_string(),
        id: price_book_id.to_string(),
    })?;

    Ok(Json(PriceBookResponse::from(book)))
}

/// List price books
#[utoipa::path(
    get,
    path = "/price-books",
    tag = "price-books",
    summary = "List price books",
    description = "List catalog versions, newest effective date first",
    params(
        ListPriceBooksQuery
    ),
    responses(
        (status = 200, description = "List of price books", body = [PriceBookResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_price_books(
    State(state): State<AppState>,
    Query(query): Query<ListPriceBooksQuery>,
    _perm: RequiresPermission<resource::PriceBooks, operation::ReadAll>,
) -> Result<Json<Vec<PriceBookResponse>>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut books = PriceBooks::new(&mut pool_conn);

    let all = books.list(skip, limit).await?;
    Ok(Json(all.into_iter().map(PriceBookResponse::from).collect()))
}

/// Update a price book
#[utoipa::path(
    patch,
    path = "/price-books/{price_book_id}",
    tag = "price-books",
    summary = "Update a price book",
    description = "Correct a catalog version before it takes effect (admin only)",
    params(
        ("price_book_id" = String, Path, description = "Price book ID"),
    ),
    request_body = PriceBookUpdate,
    responses(
        (status = 200, description = "Updated price book", body = PriceBookResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 404, description = "Price book not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_price_book(
    State(state): State<AppState>,
    Path(price_book_id): Path<PriceBookId>,
    _perm: RequiresPermission<resource::PriceBooks, operation::UpdateAll>,
    Json(data): Json<PriceBookUpdate>,
) -> Result<Json<PriceBookResponse>> {
    if data.price_per_credit.is_some_and(|p| p <= Decimal::ZERO) {
        return Err(Error::BadRequest {
            message: "price_per_credit must be positive".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut books = PriceBooks::new(&mut pool_conn);

    let updated = books
        .update(
            price_book_id,
            &PriceBookUpdateDBRequest {
                price_per_credit: data.price_per_credit,
                effective_from: data.effective_from,
                terms_of_service: data.terms_of_service,
            },
        )
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Price book".to_string(),
            id: price_book_id.to_string(),
        })?;

    Ok(Json(PriceBookResponse::from(updated)))
}

/// Delete a price book
#[utoipa::path(
    delete,
    path = "/price-books/{price_book_id}",
    tag = "price-books",
    summary = "Delete a price book",
    description = "Remove a catalog version and its plans (admin only)",
    params(
        ("price_book_id" = String, Path, description = "Price book ID"),
    ),
    responses(
        (status = 204, description = "Price book deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 404, description = "Price book not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_price_book(
    State(state): State<AppState>,
    Path(price_book_id): Path<PriceBookId>,
    _perm: RequiresPermission<resource::PriceBooks, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut books = PriceBooks::new(&mut pool_conn);

    if !books.delete(price_book_id).await? {
        return Err(Error::NotFound {
            resource: "Price book".to_string(),
            id: price_book_id.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

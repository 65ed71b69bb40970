use crate::{
    api::models::users::{CurrentUser, ListUsersQuery, ReferrerResponse, UserResponse, UserUpdate},
    auth::permissions::{self, operation, resource, RequiresPermission},
    db::{handlers::Users, models::users::UserUpdateDBRequest},
    errors::{Error, Result},
    types::{Operation, Resource, UserId},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Get the calling user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    summary = "Get current user",
    description = "Get the account of the authenticated caller",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);

    let user = users.get_by_id(current_user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: current_user.id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Get a user",
    description = "Get one user account. Users can only read their own account.",
    params(
        ("user_id" = String, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<UserResponse>> {
    let can_read_all = permissions::has_permission(&current_user, Resource::Users, Operation::ReadAll);
    let can_read_own = permissions::can_read_own_resource(&current_user, Resource::Users, user_id);
    if !can_read_all && !can_read_own {
        // Return 404 to avoid leaking existence
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);

    let user = users.get_by_id(user_id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: user_id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    description = "List all user accounts (admin only)",
    params(
        ListUsersQuery
    ),
    responses(
        (status = 200, description = "List of users", body = [UserResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin role"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _perm: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<Vec<UserResponse>>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);

    let all = users.list(skip, limit).await?;
    Ok(Json(all.into_iter().map(UserResponse::from).collect()))
}

/// Update a user
#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update a user",
    description = "Update profile fields. Users can update their own display name and avatar; role and verification changes require admin.",
    params(
        ("user_id" = String, Path, description = "User ID"),
    ),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
    Json(data): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    let can_update_all = permissions::has_permission(&current_user, Resource::Users, Operation::UpdateAll);
    let can_update_own = permissions::can_update_own_resource(&current_user, Resource::Users, user_id);
    if !can_update_all && !can_update_own {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    // Role and verification changes are privileged regardless of ownership
    if (data.role.is_some() || data.is_verified.is_some()) && !can_update_all {
        return Err(Error::InsufficientPermissions {
            required: crate::types::Permission::Allow(Resource::Users, Operation::UpdateAll),
            action: Operation::UpdateAll,
            resource: "users".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);

    let updated = users
        .update(
            user_id,
            &UserUpdateDBRequest {
                display_name: data.display_name,
                avatar_url: data.avatar_url,
                role: data.role,
                is_verified: data.is_verified,
            },
        )
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        })?;

    Ok(Json(UserResponse::from(updated)))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Delete a user",
    description = "Delete an account. Users can close their own account; admins can delete any.",
    params(
        ("user_id" = String, Path, description = "User ID"),
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let can_delete_all = permissions::has_permission(&current_user, Resource::Users, Operation::DeleteAll);
    let can_delete_own = permissions::can_delete_own_resource(&current_user, Resource::Users, user_id);
    if !can_delete_all && !can_delete_own {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);

    if !users.delete(user_id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Resolve a referral code
#[utoipa::path(
    get,
    path = "/referrals/{code}",
    tag = "users",
    summary = "Resolve a referral code",
    description = "Check whether a referral code exists and who owns it. Public endpoint used by the registration page.",
    params(
        ("code" = String, Path, description = "Referral code"),
    ),
    responses(
        (status = 200, description = "Referral code details", body = ReferrerResponse),
        (status = 404, description = "Unknown referral code"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn resolve_referral_code(State(state): State<AppState>, Path(code): Path<String>) -> Result<Json<ReferrerResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);

    let owner = users.get_by_referral_code(&code).await?.ok_or_else(|| Error::NotFound {
        resource: "Referral code".to_string(),
        id: code.clone(),
    })?;

    Ok(Json(ReferrerResponse {
        referral_code: code,
        display_name: owner.display_name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::users::Role, test_utils::*};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_me_returns_caller(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;

        let response = app
            .get("/api/v1/users/me")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await;

        response.assert_status_ok();
        let me: UserResponse = response.json();
        assert_eq!(me.id, user.id);
        assert_eq!(me.email, user.email);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_cannot_read_other_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user1 = create_test_user(&pool, Role::User).await;
        let user2 = create_test_user(&pool, Role::User).await;

        // Should return 404 (not 403) to avoid leaking account existence
        let response = app
            .get(&format!("/api/v1/users/{}", user2.id))
            .add_header(add_auth_headers(&user1).0, add_auth_headers(&user1).1)
            .await;

        response.assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_can_read_any_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let user = create_test_user(&pool, Role::User).await;

        let response = app
            .get(&format!("/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await;

        response.assert_status_ok();
        let fetched: UserResponse = response.json();
        assert_eq!(fetched.id, user.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_users_admin_only(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let user = create_test_user(&pool, Role::User).await;

        let response = app
            .get("/api/v1/users")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await;
        response.assert_status_forbidden();

        let response = app
            .get("/api/v1/users")
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .await;
        response.assert_status_ok();
        let users: Vec<UserResponse> = response.json();
        assert!(users.len() >= 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_updates_own_profile(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;

        let response = app
            .patch(&format!("/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({"display_name": "New Name"}))
            .await;

        response.assert_status_ok();
        let updated: UserResponse = response.json();
        assert_eq!(updated.display_name, Some("New Name".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_cannot_escalate_role(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;

        let response = app
            .patch(&format!("/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({"role": "admin"}))
            .await;

        response.assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_changes_role(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let admin = create_test_user(&pool, Role::Admin).await;
        let user = create_test_user(&pool, Role::User).await;

        let response = app
            .patch(&format!("/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&admin).0, add_auth_headers(&admin).1)
            .json(&json!({"role": "admin"}))
            .await;

        response.assert_status_ok();
        let updated: UserResponse = response.json();
        assert_eq!(updated.role, Role::Admin);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_deletes_own_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;

        let response = app
            .delete(&format!("/api/v1/users/{}", user.id))
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await;
        response.assert_status(axum::http::StatusCode::NO_CONTENT);

        // Token subject is gone now
        let response = app
            .get("/api/v1/users/me")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await;
        response.assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_resolve_referral_code(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;

        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        let mut users = Users::new(&mut conn);
        users
            .set_referral_code(user.id, "jane-doe+nexira")
            .await
            .expect("Failed to set referral code");

        // Public endpoint, no auth
        let response = app.get("/api/v1/referrals/jane-doe+nexira").await;
        response.assert_status_ok();
        let referrer: ReferrerResponse = response.json();
        assert_eq!(referrer.referral_code, "jane-doe+nexira");

        let response = app.get("/api/v1/referrals/unknown-code").await;
        response.assert_status_not_found();
    }
}

use crate::{
    api::models::{
        auth::{GoogleLoginRequest, LoginRequest, RegisterRequest, TokenResponse},
        users::{Role, UserResponse},
    },
    auth::{password, token},
    db::{
        handlers::{Ledgers, Users},
        models::{
            ledgers::{EntryType, LedgerEntryCreateDBRequest, LedgerReference},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    errors::{Error, Result},
    referral,
    types::UserId,
    AppState,
};
use axum::{extract::State, http::StatusCode, response::Json};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{info, warn};

/// Resolve an optional referral code to the referring user's id.
async fn resolve_referrer(db: &mut PgConnection, code: Option<&str>) -> Result<Option<UserId>> {
    let Some(code) = code else {
        return Ok(None);
    };
    let referrer = Users::new(db).get_by_referral_code(code).await?.ok_or_else(|| Error::BadRequest {
        message: "unknown referral code".to_string(),
    })?;
    Ok(Some(referrer.id))
}

/// Credit the referrer's bonus, if one is configured. A zero bonus writes
/// no ledger entry at all.
async fn grant_referral_bonus(db: &mut PgConnection, state: &AppState, referrer_id: UserId, new_user_id: UserId) -> Result<()> {
    let bonus = state.config.referral.bonus_credits;
    if bonus <= Decimal::ZERO {
        return Ok(());
    }

    Ledgers::new(db)
        .create_entry(&LedgerEntryCreateDBRequest {
            user_id: referrer_id,
            entry_type: EntryType::Credit,
            amount: bonus,
            reference: Some(LedgerReference::Referral(new_user_id)),
            description: Some("Referral bonus".to_string()),
        })
        .await?;

    info!(%referrer_id, %new_user_id, %bonus, "referral bonus granted");
    Ok(())
}

/// Post-creation setup shared by password and Google registration.
async fn finish_registration(db: &mut PgConnection, state: &AppState, user: &UserDBResponse) -> Result<UserDBResponse> {
    let code = referral::assign_unique_referral_code(db, user.id, user.display_name.as_deref()).await?;

    if let Some(referrer_id) = user.referred_by {
        grant_referral_bonus(db, state, referrer_id, user.id).await?;
    }

    info!(user_id = %user.id, referral_code = %code, "referral code assigned");

    Users::new(db).get_by_id(user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: user.id.to_string(),
    })
}

/// Register with email and password
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    summary = "Register",
    description = "Create an account with email and password. A referral code may be supplied; the referrer is credited a configured bonus.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 400, description = "Bad request - invalid email, password, or referral code"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn register(State(state): State<AppState>, Json(data): Json<RegisterRequest>) -> Result<(StatusCode, Json<TokenResponse>)> {
    if !data.email.contains('@') {
        return Err(Error::BadRequest {
            message: "invalid email address".to_string(),
        });
    }
    if data.password.len() < 8 {
        return Err(Error::BadRequest {
            message: "password must be at least 8 characters".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let referred_by = resolve_referrer(&mut pool_conn, data.referral_code.as_deref()).await?;

    let password_hash = password::hash_string(&data.password).map_err(|e| Error::BadRequest {
        message: format!("unusable password: {e}"),
    })?;

    let user = Users::new(&mut pool_conn)
        .create(&UserCreateDBRequest {
            email: data.email.to_lowercase(),
            password_hash: Some(password_hash),
            google_id: None,
            display_name: data.display_name,
            avatar_url: None,
            is_verified: false,
            role: Role::User,
            referred_by,
        })
        .await?;

    let user = finish_registration(&mut pool_conn, &state, &user).await?;

    let access_token = token::issue(&state.config.auth, user.id, &user.email)?;
    info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse::bearer(access_token, UserResponse::from(user))),
    ))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn login(State(state): State<AppState>, Json(data): Json<LoginRequest>) -> Result<Json<TokenResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut pool_conn);

    // Uniform rejection: never reveal whether the account exists or is
    // password-less (Google only)
    let invalid = || Error::Unauthorized {
        message: "invalid email or password".to_string(),
    };

    let user = users.get_by_email(&data.email.to_lowercase()).await?.ok_or_else(invalid)?;
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !password::verify_string(&data.password, hash) {
        return Err(invalid());
    }

    let access_token = token::issue(&state.config.auth, user.id, &user.email)?;
    Ok(Json(TokenResponse::bearer(access_token, UserResponse::from(user))))
}

/// Log in or register with a Google ID token
#[utoipa::path(
    post,
    path = "/auth/google",
    tag = "auth",
    summary = "Google sign-in",
    description = "Verify a Google ID token and log the user in, creating or linking the account on first use. Referral codes are honored only when a new account is created.",
    request_body = GoogleLoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 400, description = "Bad request - invalid referral code"),
        (status = 401, description = "Identity token rejected"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn google_login(State(state): State<AppState>, Json(data): Json<GoogleLoginRequest>) -> Result<Json<TokenResponse>> {
    let identity = state.identity.verify_id_token(&data.id_token).await.map_err(|e| {
        warn!(error = %e, "google id token rejected");
        Error::Unauthorized {
            message: "identity token rejected".to_string(),
        }
    })?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Already linked
    if let Some(user) = Users::new(&mut pool_conn).get_by_google_id(&identity.google_id).await? {
        let access_token = token::issue(&state.config.auth, user.id, &user.email)?;
        return Ok(Json(TokenResponse::bearer(access_token, UserResponse::from(user))));
    }

    let email = identity.email.to_lowercase();

    // Existing password account with the same verified email gets linked
    if let Some(user) = Users::new(&mut pool_conn).get_by_email(&email).await? {
        if !identity.email_verified {
            return Err(Error::Unauthorized {
                message: "google account email is not verified".to_string(),
            });
        }
        Users::new(&mut pool_conn).link_google_identity(user.id, &identity.google_id).await?;
        let user = Users::new(&mut pool_conn).get_by_id(user.id).await?.ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: user.id.to_string(),
        })?;
        info!(user_id = %user.id, "google identity linked to existing account");
        let access_token = token::issue(&state.config.auth, user.id, &user.email)?;
        return Ok(Json(TokenResponse::bearer(access_token, UserResponse::from(user))));
    }

    // First login creates the account
    let referred_by = resolve_referrer(&mut pool_conn, data.referral_code.as_deref()).await?;

    let user = Users::new(&mut pool_conn)
        .create(&UserCreateDBRequest {
            email,
            password_hash: None,
            google_id: Some(identity.google_id),
            display_name: identity.display_name,
            avatar_url: identity.avatar_url,
            is_verified: identity.email_verified,
            role: Role::User,
            referred_by,
        })
        .await?;

    let user = finish_registration(&mut pool_conn, &state, &user).await?;

    info!(user_id = %user.id, "user registered via google");
    let access_token = token::issue(&state.config.auth, user.id, &user.email)?;
    Ok(Json(TokenResponse::bearer(access_token, UserResponse::from(user))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::ledgers::LedgerEntryResponse, test_utils::*};
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn register_body(email: &str) -> serde_json::Value {
        json!({
            "email": email,
            "password": "correct horse battery",
            "display_name": "Jane Doe"
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_and_login(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let email = format!("jane_{}@example.com", Uuid::new_v4().simple());

        let response = app.post("/api/v1/auth/register").json(&register_body(&email)).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let registered: TokenResponse = response.json();
        assert_eq!(registered.token_type, "Bearer");
        assert_eq!(registered.user.email, email);
        // A referral code was assigned at registration
        assert!(registered.user.referral_code.is_some());

        // The token works immediately
        let response = app
            .get("/api/v1/users/me")
            .add_header(
                axum::http::HeaderName::from_static("authorization"),
                axum::http::HeaderValue::from_str(&format!("Bearer {}", registered.access_token)).unwrap(),
            )
            .await;
        response.assert_status_ok();

        let response = app
            .post("/api/v1/auth/login")
            .json(&json!({"email": email, "password": "correct horse battery"}))
            .await;
        response.assert_status_ok();

        let response = app
            .post("/api/v1/auth/login")
            .json(&json!({"email": email, "password": "wrong"}))
            .await;
        response.assert_status_unauthorized();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_duplicate_email_conflict(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let email = format!("dup_{}@example.com", Uuid::new_v4().simple());

        app.post("/api/v1/auth/register")
            .json(&register_body(&email))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let response = app.post("/api/v1/auth/register").json(&register_body(&email)).await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_validates_input(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({"email": "not-an-email", "password": "long enough pass"}))
            .await;
        response.assert_status_bad_request();

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({"email": "a@example.com", "password": "short"}))
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_referral_bonus_credited(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        // Referrer registers first and gets a code
        let referrer_email = format!("ref_{}@example.com", Uuid::new_v4().simple());
        let response = app.post("/api/v1/auth/register").json(&register_body(&referrer_email)).await;
        let referrer: TokenResponse = response.json();
        let code = referrer.user.referral_code.clone().expect("referrer has a code");

        // New user registers with the code
        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": format!("new_{}@example.com", Uuid::new_v4().simple()),
                "password": "correct horse battery",
                "referral_code": code
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let referred: TokenResponse = response.json();
        assert_eq!(referred.user.referred_by, Some(referrer.user.id));

        // Referrer was credited the configured bonus, tagged with the new user
        let entries = app
            .get("/api/v1/ledger/entries")
            .add_header(
                axum::http::HeaderName::from_static("authorization"),
                axum::http::HeaderValue::from_str(&format!("Bearer {}", referrer.access_token)).unwrap(),
            )
            .await
            .json::<Vec<LedgerEntryResponse>>();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::Credit);
        assert_eq!(entries[0].reference, Some(LedgerReference::Referral(referred.user.id)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_referral_code_rejected(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": format!("x_{}@example.com", Uuid::new_v4().simple()),
                "password": "correct horse battery",
                "referral_code": "no-such-code"
            }))
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_google_login_creates_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        // The test identity verifier accepts "gid:<id>:<email>" tokens
        let email = format!("goog_{}@example.com", Uuid::new_v4().simple());
        let response = app
            .post("/api/v1/auth/google")
            .json(&json!({"id_token": format!("gid:sub-123:{email}")}))
            .await;
        response.assert_status_ok();
        let first: TokenResponse = response.json();
        assert_eq!(first.user.email, email);
        assert!(first.user.is_verified);
        assert!(first.user.referral_code.is_some());

        // Second login reuses the account
        let response = app
            .post("/api/v1/auth/google")
            .json(&json!({"id_token": format!("gid:sub-123:{email}")}))
            .await;
        response.assert_status_ok();
        let second: TokenResponse = response.json();
        assert_eq!(second.user.id, first.user.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_google_login_links_password_account(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let email = format!("link_{}@example.com", Uuid::new_v4().simple());

        let response = app.post("/api/v1/auth/register").json(&register_body(&email)).await;
        let registered: TokenResponse = response.json();

        let response = app
            .post("/api/v1/auth/google")
            .json(&json!({"id_token": format!("gid:sub-456:{email}")}))
            .await;
        response.assert_status_ok();
        let linked: TokenResponse = response.json();
        assert_eq!(linked.user.id, registered.user.id);
        assert!(linked.user.is_verified);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_google_bad_token_rejected(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/auth/google")
            .json(&json!({"id_token": "garbage"}))
            .await;
        response.assert_status_unauthorized();
    }
}

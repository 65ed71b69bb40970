mod api;
mod auth;
mod config;
mod db;
mod errors;
mod imaging;
mod openapi;
mod payments;
mod pricing;
mod referral;
mod types;

#[cfg(test)]
mod test_utils;

use crate::{
    api::models::users::Role,
    auth::{
        google::{GoogleVerifier, IdentityVerifier},
        password,
    },
    db::{handlers::Users, models::users::UserCreateDBRequest},
    imaging::{gemini::GeminiClient, ImageGenerator},
    openapi::ApiDoc,
    payments::{stripe::StripeGateway, PaymentGateway},
};
use axum::{
    http::{HeaderValue, Request, Response},
    routing::{delete, get, patch, post},
    Router,
};
use bon::Builder;
use clap::Parser;
use config::{Args, Config};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, Span};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

pub use types::{ImageTaskId, LedgerEntryId, PaymentSessionId, PlanId, PriceBookId, UserId};

#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub payments: Arc<dyn PaymentGateway>,
    pub generator: Arc<dyn ImageGenerator>,
    pub identity: Arc<dyn IdentityVerifier>,
}

/// Create the initial admin user if it doesn't exist
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> Result<UserId, sqlx::Error> {
    let password_hash = if let Some(pwd) = password {
        Some(password::hash_string(pwd).map_err(|e| sqlx::Error::Encode(format!("Failed to hash admin password: {e}").into()))?)
    } else {
        None
    };

    let mut tx = db.begin().await?;
    let mut users = Users::new(&mut tx);

    if let Some(existing_user) = users
        .get_by_email(email)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to check existing user: {e}")))?
    {
        // User exists - refresh the password if one was provided
        if let Some(password_hash) = password_hash {
            Users::new(&mut tx)
                .update_password_hash(existing_user.id, &password_hash)
                .await
                .map_err(|e| sqlx::Error::Protocol(format!("Failed to update admin password: {e}")))?;
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let created = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            password_hash,
            google_id: None,
            display_name: None,
            avatar_url: None,
            is_verified: true,
            role: Role::Admin,
            referred_by: None,
        })
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to create admin user: {e}")))?;

    referral::assign_unique_referral_code(&mut tx, created.id, None)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to assign admin referral code: {e}")))?;

    tx.commit().await?;
    Ok(created.id)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors_allowed_origins {
        origins.push(origin.parse::<HeaderValue>()?);
    }
    Ok(CorsLayer::new().allow_origin(origins))
}

pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        // Authentication
        .route("/auth/register", post(api::handlers::auth::register))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/google", post(api::handlers::auth::google_login))
        // User management
        .route("/users/me", get(api::handlers::users::get_current_user))
        .route("/users", get(api::handlers::users::list_users))
        .route("/users/{user_id}", get(api::handlers::users::get_user))
        .route("/users/{user_id}", patch(api::handlers::users::update_user))
        .route("/users/{user_id}", delete(api::handlers::users::delete_user))
        .route("/referrals/{code}", get(api::handlers::users::resolve_referral_code))
        // Credit ledger
        .route("/ledger/entries", post(api::handlers::ledgers::create_ledger_entry))
        .route("/ledger/entries", get(api::handlers::ledgers::list_ledger_entries))
        .route("/ledger/entries/{entry_id}", get(api::handlers::ledgers::get_ledger_entry))
        .route("/ledger/balance", get(api::handlers::ledgers::get_balance))
        // Catalog
        .route("/price-books", post(api::handlers::price_books::create_price_book))
        .route("/price-books", get(api::handlers::price_books::list_price_books))
        .route("/price-books/current", get(api::handlers::price_books::get_current_price_book))
        .route("/price-books/{price_book_id}", get(api::handlers::price_books::get_price_book))
        .route("/price-books/{price_book_id}", patch(api::handlers::price_books::update_price_book))
        .route("/price-books/{price_book_id}", delete(api::handlers::price_books::delete_price_book))
        .route("/plans", post(api::handlers::plans::create_plan))
        .route("/plans", get(api::handlers::plans::list_plans))
        .route("/plans/{plan_id}", get(api::handlers::plans::get_plan))
        .route("/plans/{plan_id}", patch(api::handlers::plans::update_plan))
        .route("/plans/{plan_id}", delete(api::handlers::plans::delete_plan))
        // Payments
        .route("/checkout", post(api::handlers::payments::create_checkout))
        .route("/webhooks/stripe", post(api::handlers::payments::stripe_webhook))
        .route("/payment-sessions", get(api::handlers::payments::list_payment_sessions))
        .route("/payment-sessions/{session_id}", get(api::handlers::payments::get_payment_session))
        // Image enhancement
        .route("/enhance", post(api::handlers::enhance::enhance_image))
        .route("/analyze/image", post(api::handlers::enhance::analyze_image))
        .route("/analyze/reference", post(api::handlers::enhance::analyze_reference))
        .route("/image-tasks", get(api::handlers::enhance::list_image_tasks))
        .route("/image-tasks/{task_id}", get(api::handlers::enhance::get_image_task))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = %response.status(),
                        latency = ?latency,
                        "request completed"
                    );
                }),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/api/docs"));

    let cors_layer = create_cors_layer(&state.config)?;
    Ok(router.layer(cors_layer))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    debug!("{:?}", args);

    let config = Config::load(&args)?;
    debug!("Starting with configuration: {:#?}", config);

    let pool = PgPool::connect(&config.database_url).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // create admin user if it doesn't exist
    if let Some(admin_email) = &config.admin.email {
        create_initial_admin_user(admin_email, config.admin.password.as_deref(), &pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;
    }

    let gemini = Arc::new(GeminiClient::new(config.gemini.clone()));
    let state = AppState::builder()
        .db(pool)
        .config(config.clone())
        .payments(Arc::new(StripeGateway::new(config.stripe.clone())))
        .generator(gemini)
        .identity(Arc::new(GoogleVerifier::new(config.google.clone())))
        .build();

    let router = build_router(state)?;

    let bind_addr = config.bind_address();
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}, available at http://localhost:{}", bind_addr, config.port);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

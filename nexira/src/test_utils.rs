//! Shared helpers for endpoint tests: an app wired with mock gateways,
//! factory functions for rows, and auth header construction.

use crate::{
    api::models::users::Role,
    auth::{
        google::{IdentityError, IdentityVerifier, VerifiedIdentity},
        token,
    },
    config::{AuthConfig, Config},
    db::{
        handlers::{Plans, PriceBooks, Users},
        models::{
            plans::{PlanCreateDBRequest, PlanDBResponse},
            price_books::{PriceBookCreateDBRequest, PriceBookDBResponse},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    imaging::{GenerationOutput, ImageGenerator, ImagingError, InlineImage},
    payments::{signature, CheckoutSession, PaymentError, PaymentGateway, WebhookEvent},
    types::PriceBookId,
    AppState,
};
use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-not-for-production";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = TEST_JWT_SECRET.to_string();
    config.stripe.webhook_secret = TEST_WEBHOOK_SECRET.to_string();
    // Generous deadline so slow CI never flakes the happy path
    config.enhancement.generation_deadline = Duration::from_secs(30);
    config
}

fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        token_ttl: Duration::from_secs(3600),
    }
}

/// Payment gateway that never leaves the process. Checkout sessions get
/// unique external ids; webhook verification uses the real signature code
/// against [`TEST_WEBHOOK_SECRET`].
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        _external_price_id: &str,
        _customer_email: &str,
        _success_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: format!("https://checkout.example.com/{id}"),
            id,
            amount_total: Decimal::from_str("5.00").map_err(|e| PaymentError::Request(e.to_string()))?,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, PaymentError> {
        signature::verify(payload, signature_header, TEST_WEBHOOK_SECRET, signature::DEFAULT_TOLERANCE)?;

        let envelope: serde_json::Value = serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;
        let event_type = envelope["type"]
            .as_str()
            .ok_or_else(|| PaymentError::InvalidPayload("missing type".to_string()))?;
        let session_id = envelope["data"]["object"]["id"]
            .as_str()
            .ok_or_else(|| PaymentError::InvalidPayload("missing session id".to_string()))?;

        Ok(WebhookEvent {
            event_type: event_type.to_string(),
            session_id: session_id.to_string(),
        })
    }
}

/// In-process stand-in for the generation backend.
pub struct MockImageGenerator {
    fail: bool,
}

impl MockImageGenerator {
    pub fn succeeding() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, _prompt: &str, _images: &[InlineImage]) -> Result<GenerationOutput, ImagingError> {
        if self.fail {
            return Err(ImagingError::Rejected("mock generator failure".to_string()));
        }
        Ok(GenerationOutput {
            image: InlineImage {
                mime_type: "image/png".to_string(),
                data: "Z2VuZXJhdGVkLWltYWdlLWJ5dGVz".to_string(),
            },
        })
    }

    async fn analyze(&self, _prompt: &str, _image: &InlineImage) -> Result<String, ImagingError> {
        if self.fail {
            return Err(ImagingError::Rejected("mock generator failure".to_string()));
        }
        Ok("A brightly lit studio scene with soft shadows".to_string())
    }
}

/// Accepts tokens of the form `gid:<sub>:<email>` and rejects everything
/// else, so tests control the asserted identity directly.
pub struct MockIdentityVerifier;

#[async_trait]
impl IdentityVerifier for MockIdentityVerifier {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let mut parts = id_token.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("gid"), Some(sub), Some(email)) if !sub.is_empty() && !email.is_empty() => Ok(VerifiedIdentity {
                google_id: sub.to_string(),
                email: email.to_string(),
                email_verified: true,
                display_name: None,
                avatar_url: None,
            }),
            _ => Err(IdentityError::Rejected("unrecognized test token".to_string())),
        }
    }
}

fn build_test_state(pool: PgPool, generator: MockImageGenerator) -> AppState {
    AppState::builder()
        .db(pool)
        .config(create_test_config())
        .payments(Arc::new(MockPaymentGateway))
        .generator(Arc::new(generator))
        .identity(Arc::new(MockIdentityVerifier))
        .build()
}

pub async fn create_test_app(pool: PgPool) -> (TestServer, AppState) {
    let state = build_test_state(pool, MockImageGenerator::succeeding());
    let router = crate::build_router(state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, state)
}

/// Like [`create_test_app`] but every generation attempt fails, for
/// exercising the no-debit-on-failure path.
pub async fn create_failing_generation_app(pool: PgPool) -> (TestServer, AppState) {
    let state = build_test_state(pool, MockImageGenerator::failing());
    let router = crate::build_router(state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, state)
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users = Users::new(&mut conn);
    users
        .create(&UserCreateDBRequest {
            email: format!("user-{}@example.com", Uuid::new_v4().simple()),
            password_hash: None,
            google_id: None,
            display_name: Some("Test User".to_string()),
            avatar_url: None,
            is_verified: true,
            role,
            referred_by: None,
        })
        .await
        .expect("Failed to create test user")
}

/// Bearer header for a test user, signed with the test JWT secret.
pub fn add_auth_headers(user: &UserDBResponse) -> (HeaderName, HeaderValue) {
    let token = token::issue(&test_auth_config(), user.id, &user.email).expect("Failed to issue token");
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {token}")).expect("Failed to build header value"),
    )
}

pub async fn create_test_price_book(pool: &PgPool) -> PriceBookDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut books = PriceBooks::new(&mut conn);
    books
        .create(&PriceBookCreateDBRequest {
            version_tag: format!("v-{}", Uuid::new_v4().simple()),
            price_per_credit: Decimal::from_str("0.10").expect("Invalid decimal"),
            effective_from: Utc::now(),
            terms_of_service: "test terms".to_string(),
        })
        .await
        .expect("Failed to create test price book")
}

pub async fn create_test_plan(pool: &PgPool, price_book_id: PriceBookId) -> PlanDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut plans = Plans::new(&mut conn);
    plans
        .create(&PlanCreateDBRequest {
            price_book_id,
            name: "Starter".to_string(),
            price: Decimal::from_str("5.00").expect("Invalid decimal"),
            credits: Decimal::from_str("50").expect("Invalid decimal"),
            external_price_id: Some("price_123".to_string()),
            description: None,
            is_active: true,
        })
        .await
        .expect("Failed to create test plan")
}

/// Stripe-style signature header over a payload, valid for the mock
/// gateway's secret.
pub fn sign_webhook_payload(payload: &[u8]) -> HeaderValue {
    let ts = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes()).expect("HMAC accepts any key length");
    mac.update(ts.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let header = format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()));
    HeaderValue::from_str(&header).expect("Failed to build header value")
}

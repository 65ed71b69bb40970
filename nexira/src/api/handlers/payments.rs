use crate::{
    api::models::payment_sessions::{
        CheckoutRequest, CheckoutResponse, ListPaymentSessionsQuery, PaymentSessionResponse, WebhookAck,
    },
    api::models::users::CurrentUser,
    auth::permissions::{self, operation, resource, RequiresPermission},
    db::{
        handlers::{ConfirmOutcome, PaymentSessions, Plans},
        models::payment_sessions::PaymentSessionCreateDBRequest,
    },
    errors::{Error, Result},
    types::{Operation, PaymentSessionId, Permission, Resource},
    AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use tracing::{error, info, warn};

/// Start a checkout session
#[utoipa::path(
    post,
    path = "/checkout",
    tag = "payments",
    summary = "Start a checkout",
    description = "Open a hosted checkout session for a plan. The pending session is recorded before the URL is returned, so the later webhook always finds it.",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Checkout session created", body = CheckoutResponse),
        (status = 400, description = "Plan is not purchasable"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Plan not found"),
        (status = 502, description = "Payment gateway unavailable"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    perm: RequiresPermission<resource::PaymentSessions, operation::CreateOwn>,
    Json(data): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let plan = Plans::new(&mut pool_conn)
        .get_by_id(data.plan_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Plan".to_string(),
            id: data.plan_id.to_string(),
        })?;

    if !plan.is_active {
        return Err(Error::BadRequest {
            message: "plan is no longer for sale".to_string(),
        });
    }
    let external_price_id = plan.external_price_id.as_deref().ok_or_else(|| Error::BadRequest {
        message: "plan has no gateway price configured".to_string(),
    })?;

    let checkout = state
        .payments
        .create_checkout_session(external_price_id, &perm.email, &data.success_url, &data.cancel_url)
        .await
        .map_err(|e| Error::ExternalService { message: e.to_string() })?;

    // The pending row must exist before the client gets the URL
    let session = PaymentSessions::new(&mut pool_conn)
        .create(&PaymentSessionCreateDBRequest {
            user_id: perm.id,
            plan_id: plan.id,
            external_session_id: checkout.id.clone(),
            amount: checkout.amount_total,
        })
        .await?;

    info!(session_id = %session.id, user_id = %perm.id, plan_id = %plan.id, "checkout session opened");

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            session_id: session.id,
            checkout_url: checkout.url,
        }),
    ))
}

/// Payment gateway webhook
#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "payments",
    summary = "Stripe webhook",
    description = "Receives gateway events. Signature is verified against the raw body; completed checkouts are reconciled idempotently, so redeliveries never double-credit.",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Invalid signature or payload"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(Error::InvalidWebhookSignature)?;

    let event = state
        .payments
        .verify_webhook(&body, signature)
        .map_err(|_| Error::InvalidWebhookSignature)?;

    if !event.is_checkout_completed() {
        // Not subscribed to anything else; acknowledge so the gateway stops retrying
        return Ok(Json(WebhookAck { received: true }));
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut sessions = PaymentSessions::new(&mut pool_conn);

    match sessions.confirm_succeeded(&event.session_id).await? {
        ConfirmOutcome::Credited(entry) => {
            info!(
                external_session_id = %event.session_id,
                user_id = %entry.user_id,
                amount = %entry.amount,
                "checkout reconciled, credits granted"
            );
        }
        ConfirmOutcome::AlreadyProcessed => {
            warn!(external_session_id = %event.session_id, "webhook redelivery for settled session, ignoring");
        }
        ConfirmOutcome::NotFound => {
            // Acknowledge anyway: retries cannot fix a session we never created
            error!(external_session_id = %event.session_id, "webhook for unknown payment session");
        }
    }

    Ok(Json(WebhookAck { received: true }))
}

/// Get a payment session
#[utoipa::path(
    get,
    path = "/payment-sessions/{session_id}",
    tag = "payments",
    summary = "Get a payment session",
    description = "Get one payment session. Users can only read their own sessions.",
    params(
        ("session_id" = String, Path, description = "Payment session ID"),
    ),
    responses(
        (status = 200, description = "Session details", body = PaymentSessionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Session not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_payment_session(
    State(state): State<AppState>,
    Path(session_id): Path<PaymentSessionId>,
    current_user: CurrentUser,
) -> Result<Json<PaymentSessionResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut sessions = PaymentSessions::new(&mut pool_conn);

    let has_read_all = permissions::has_permission(&current_user, Resource::PaymentSessions, Operation::ReadAll);

    let session = sessions.get_by_id(session_id).await?;
    let session = match session {
        Some(session) => {
            if !has_read_all && session.user_id != current_user.id {
                // Return 404 to avoid leaking existence
                return Err(Error::NotFound {
                    resource: "Payment session".to_string(),
                    id: session_id.to_string(),
                });
            }
            session
        }
        None => {
            return Err(Error::NotFound {
                resource: "Payment session".to_string(),
                id: session_id.to_string(),
            });
        }
    };

    Ok(Json(PaymentSessionResponse::from(session)))
}

/// List payment sessions
#[utoipa::path(
    get,
    path = "/payment-sessions",
    tag = "payments",
    summary = "List payment sessions",
    description = "List payment sessions, newest first. Users see their own; admins can filter by user or see all.",
    params(
        ListPaymentSessionsQuery
    ),
    responses(
        (status = 200, description = "List of sessions", body = [PaymentSessionResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - cannot access other users' sessions"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_payment_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentSessionsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<PaymentSessionResponse>>> {
    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);

    let has_read_all = permissions::has_permission(&current_user, Resource::PaymentSessions, Operation::ReadAll);

    let filter_user_id = match query.user_id {
        Some(requested_user_id) => {
            if !has_read_all && requested_user_id != current_user.id {
                return Err(Error::InsufficientPermissions {
                    required: Permission::Allow(Resource::PaymentSessions, Operation::ReadAll),
                    action: Operation::ReadAll,
                    resource: "payment sessions".to_string(),
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
    let mut sessions = PaymentSessions::new(&mut pool_conn);

    let all = sessions.list(filter_user_id, skip, limit).await?;
    Ok(Json(all.into_iter().map(PaymentSessionResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::models::{ledgers::LedgerEntryResponse, users::Role},
        db::models::payment_sessions::SessionStatus,
        test_utils::*,
    };
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;
    use std::str::FromStr;

    #[sqlx::test]
    #[test_log::test]
    async fn test_checkout_records_pending_session(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let book = create_test_price_book(&pool).await;
        let plan = create_test_plan(&pool, book.id).await;

        let response = app
            .post("/api/v1/checkout")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({
                "plan_id": plan.id.to_string(),
                "success_url": "https://app.example.com/success",
                "cancel_url": "https://app.example.com/cancel"
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let checkout: CheckoutResponse = response.json();
        assert!(!checkout.checkout_url.is_empty());

        // Pending row visible to the user
        let response = app
            .get(&format!("/api/v1/payment-sessions/{}", checkout.session_id))
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await;
        response.assert_status_ok();
        let session: PaymentSessionResponse = response.json();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.user_id, user.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_checkout_rejects_inactive_plan(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let book = create_test_price_book(&pool).await;
        let plan = create_test_plan(&pool, book.id).await;

        sqlx::query("UPDATE plans SET is_active = FALSE WHERE id = $1")
            .bind(plan.id)
            .execute(&pool)
            .await
            .expect("Failed to deactivate plan");

        let response = app
            .post("/api/v1/checkout")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({
                "plan_id": plan.id.to_string(),
                "success_url": "https://app.example.com/success",
                "cancel_url": "https://app.example.com/cancel"
            }))
            .await;

        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_credits_and_is_idempotent(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let book = create_test_price_book(&pool).await;
        let plan = create_test_plan(&pool, book.id).await;

        let response = app
            .post("/api/v1/checkout")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .json(&json!({
                "plan_id": plan.id.to_string(),
                "success_url": "https://app.example.com/success",
                "cancel_url": "https://app.example.com/cancel"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let checkout: CheckoutResponse = response.json();

        let session = app
            .get(&format!("/api/v1/payment-sessions/{}", checkout.session_id))
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await
            .json::<PaymentSessionResponse>();

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": session.external_session_id}}
        })
        .to_string();

        // First delivery settles the session and credits the plan
        let response = app
            .post("/api/v1/webhooks/stripe")
            .add_header(
                axum::http::HeaderName::from_static("stripe-signature"),
                sign_webhook_payload(payload.as_bytes()),
            )
            .bytes(payload.clone().into())
            .content_type("application/json")
            .await;
        response.assert_status_ok();

        // Redelivery is acknowledged but must not credit again
        let response = app
            .post("/api/v1/webhooks/stripe")
            .add_header(
                axum::http::HeaderName::from_static("stripe-signature"),
                sign_webhook_payload(payload.as_bytes()),
            )
            .bytes(payload.into())
            .content_type("application/json")
            .await;
        response.assert_status_ok();

        let entries = app
            .get("/api/v1/ledger/entries")
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await
            .json::<Vec<LedgerEntryResponse>>();
        assert_eq!(entries.len(), 1, "redelivery must not create a second ledger entry");
        assert_eq!(entries[0].amount, Decimal::from_str("50").unwrap());

        let session = app
            .get(&format!("/api/v1/payment-sessions/{}", checkout.session_id))
            .add_header(add_auth_headers(&user).0, add_auth_headers(&user).1)
            .await
            .json::<PaymentSessionResponse>();
        assert_eq!(session.status, SessionStatus::Succeeded);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_bad_signature_rejected(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_anything"}}
        })
        .to_string();

        let response = app
            .post("/api/v1/webhooks/stripe")
            .add_header(
                axum::http::HeaderName::from_static("stripe-signature"),
                axum::http::HeaderValue::from_static("t=1,v1=deadbeef"),
            )
            .bytes(payload.into())
            .content_type("application/json")
            .await;

        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_unknown_session_acknowledged(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        let payload = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_never_created"}}
        })
        .to_string();

        let response = app
            .post("/api/v1/webhooks/stripe")
            .add_header(
                axum::http::HeaderName::from_static("stripe-signature"),
                sign_webhook_payload(payload.as_bytes()),
            )
            .bytes(payload.into())
            .content_type("application/json")
            .await;

        // Acknowledged so the gateway stops retrying
        response.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_sessions_are_private(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let user1 = create_test_user(&pool, Role::User).await;
        let user2 = create_test_user(&pool, Role::User).await;
        let book = create_test_price_book(&pool).await;
        let plan = create_test_plan(&pool, book.id).await;

        let response = app
            .post("/api/v1/checkout")
            .add_header(add_auth_headers(&user2).0, add_auth_headers(&user2).1)
            .json(&json!({
                "plan_id": plan.id.to_string(),
                "success_url": "https://app.example.com/success",
                "cancel_url": "https://app.example.com/cancel"
            }))
            .await;
        let checkout: CheckoutResponse = response.json();

        // Should return 404 (not 403) to avoid leaking session existence
        let response = app
            .get(&format!("/api/v1/payment-sessions/{}", checkout.session_id))
            .add_header(add_auth_headers(&user1).0, add_auth_headers(&user1).1)
            .await;
        response.assert_status_not_found();

        let response = app
            .get(&format!("/api/v1/payment-sessions?user_id={}", user2.id))
            .add_header(add_auth_headers(&user1).0, add_auth_headers(&user1).1)
            .await;
        response.assert_status_forbidden();

        let response = app
            .get("/api/v1/payment-sessions")
            .add_header(add_auth_headers(&user1).0, add_auth_headers(&user1).1)
            .await;
        response.assert_status_ok();
        let sessions: Vec<PaymentSessionResponse> = response.json();
        assert!(sessions.is_empty());
    }
}

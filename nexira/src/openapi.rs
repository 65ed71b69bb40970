use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use crate::api;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "bearer_auth".to_string(),
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "API server")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::google_login,
        api::handlers::users::get_current_user,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::users::resolve_referral_code,
        api::handlers::ledgers::create_ledger_entry,
        api::handlers::ledgers::get_ledger_entry,
        api::handlers::ledgers::list_ledger_entries,
        api::handlers::ledgers::get_balance,
        api::handlers::price_books::create_price_book,
        api::handlers::price_books::get_current_price_book,
        api::handlers::price_books::get_price_book,
        api::handlers::price_books::list_price_books,
        api::handlers::price_books::update_price_book,
        api::handlers::price_books::delete_price_book,
        api::handlers::plans::create_plan,
        api::handlers::plans::get_plan,
        api::handlers::plans::list_plans,
        api::handlers::plans::update_plan,
        api::handlers::plans::delete_plan,
        api::handlers::payments::create_checkout,
        api::handlers::payments::stripe_webhook,
        api::handlers::payments::get_payment_session,
        api::handlers::payments::list_payment_sessions,
        api::handlers::enhance::enhance_image,
        api::handlers::enhance::analyze_image,
        api::handlers::enhance::analyze_reference,
        api::handlers::enhance::get_image_task,
        api::handlers::enhance::list_image_tasks,
    ),
    components(
        schemas(
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::GoogleLoginRequest,
            api::models::auth::TokenResponse,
            api::models::users::Role,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::users::CurrentUser,
            api::models::users::ListUsersQuery,
            api::models::users::BalanceResponse,
            api::models::users::ReferrerResponse,
            api::models::ledgers::LedgerEntryCreate,
            api::models::ledgers::LedgerEntryResponse,
            api::models::ledgers::ListLedgerEntriesQuery,
            api::models::price_books::PriceBookCreate,
            api::models::price_books::PriceBookUpdate,
            api::models::price_books::PriceBookResponse,
            api::models::price_books::ListPriceBooksQuery,
            api::models::plans::PlanCreate,
            api::models::plans::PlanUpdate,
            api::models::plans::PlanResponse,
            api::models::plans::ListPlansQuery,
            api::models::payment_sessions::CheckoutRequest,
            api::models::payment_sessions::CheckoutResponse,
            api::models::payment_sessions::PaymentSessionResponse,
            api::models::payment_sessions::WebhookAck,
            api::models::payment_sessions::ListPaymentSessionsQuery,
            api::models::enhance::ToolType,
            api::models::enhance::AspectRatio,
            api::models::enhance::ImageQuality,
            api::models::enhance::BackgroundMode,
            api::models::enhance::CameraAngle,
            api::models::enhance::UsageScenario,
            api::models::enhance::StyleInput,
            api::models::enhance::BackgroundSpec,
            api::models::enhance::EnhanceImageRequest,
            api::models::enhance::EnhanceImageResponse,
            api::models::enhance::AnalyzeImageRequest,
            api::models::enhance::AnalyzeImageResponse,
            api::models::enhance::ImageTaskResponse,
            api::models::enhance::ListImageTasksQuery,
            crate::db::models::ledgers::EntryType,
            crate::db::models::ledgers::LedgerReference,
            crate::db::models::payment_sessions::SessionStatus,
            crate::db::models::image_tasks::TaskStatus,
        )
    ),
    tags(
        (name = "auth", description = "Authentication API"),
        (name = "users", description = "User account management"),
        (name = "ledger", description = "Credit ledger and balances"),
        (name = "price-books", description = "Catalog version management"),
        (name = "plans", description = "Plan management"),
        (name = "payments", description = "Checkout and payment reconciliation"),
        (name = "enhance", description = "Image enhancement and analysis"),
    ),
    info(
        title = "Nexira API",
        version = "0.1.0",
        description = "API for accounts, credit billing, and AI image enhancement",
    ),
)]
pub struct ApiDoc;

//! Payment gateway integration.
//!
//! The rest of the app talks to [`PaymentGateway`] so tests can swap in a
//! mock. The production implementation is [`stripe::StripeGateway`].

pub mod signature;
pub mod stripe;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
    #[error("unsupported webhook payload: {0}")]
    InvalidPayload(String),
    #[error("gateway request failed: {0}")]
    Request(String),
}

/// Checkout session created at the gateway. The external id is our
/// idempotency key for webhook reconciliation.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub amount_total: Decimal,
}

/// A webhook event we care about, extracted from the raw delivery.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub session_id: String,
}

impl WebhookEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == "checkout.session.completed"
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session for the given plan price.
    async fn create_checkout_session(
        &self,
        external_price_id: &str,
        customer_email: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Verify the delivery signature and parse the event. Rejecting bad
    /// signatures here is what lets the webhook route trust the payload.
    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, PaymentError>;
}

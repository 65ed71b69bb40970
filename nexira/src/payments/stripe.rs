//! Stripe REST client.
//!
//! Talks to the Checkout Sessions API directly with form-encoded requests
//! rather than pulling in a full SDK; the surface we need is two calls.

use super::{signature, CheckoutSession, PaymentError, PaymentGateway, WebhookEvent};
use crate::config::StripeConfig;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: String,
    // Smallest currency unit (cents)
    amount_total: i64,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    id: String,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        external_price_id: &str,
        customer_email: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = [
            ("mode", "payment"),
            ("line_items[0][price]", external_price_id),
            ("line_items[0][quantity]", "1"),
            ("customer_email", customer_email),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Request(format!("checkout session failed with {status}: {body}")));
        }

        let session: CheckoutSessionResponse = response.json().await.map_err(|e| PaymentError::Request(e.to_string()))?;
        debug!(session_id = %session.id, "created checkout session");

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
            amount_total: Decimal::from(session.amount_total) / Decimal::from(100),
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, PaymentError> {
        signature::verify(payload, signature_header, &self.config.webhook_secret, self.config.webhook_tolerance)?;

        let envelope: EventEnvelope =
            serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

        Ok(WebhookEvent {
            event_type: envelope.event_type,
            session_id: envelope.data.object.id,
        })
    }
}

//! Google ID token verification.
//!
//! Verification goes through the tokeninfo endpoint rather than local JWKS
//! caching; login volume does not justify the key rotation machinery.
//! Behind a trait so tests can stub the identity.

use crate::config::GoogleConfig;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity token rejected: {0}")]
    Rejected(String),
    #[error("identity provider request failed: {0}")]
    Request(String),
}

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub google_id: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct GoogleVerifier {
    client: reqwest::Client,
    config: GoogleConfig,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl GoogleVerifier {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let response = self
            .client
            .get(format!("{}/tokeninfo", self.config.tokeninfo_base))
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Rejected(format!("tokeninfo returned {}", response.status())));
        }

        let info: TokenInfo = response.json().await.map_err(|e| IdentityError::Request(e.to_string()))?;

        // A token minted for another app must not authenticate here
        if info.aud != self.config.client_id {
            return Err(IdentityError::Rejected("audience mismatch".to_string()));
        }

        Ok(VerifiedIdentity {
            google_id: info.sub,
            email: info.email,
            email_verified: info.email_verified.as_deref() == Some("true"),
            display_name: info.name,
            avatar_url: info.picture,
        })
    }
}

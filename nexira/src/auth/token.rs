//! Bearer token issuing and validation.
//!
//! Access tokens are HS256 JWTs carrying the user id and email. The
//! [`CurrentUser`] extractor lives on the api model; this module owns the
//! token format.

use crate::{config::AuthConfig, errors::Error, types::UserId};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: UserId,
    pub email: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Issue an access token for a user.
pub fn issue(config: &AuthConfig, user_id: UserId, email: &str) -> Result<String, Error> {
    let expires_at = Utc::now()
        + chrono::Duration::from_std(config.token_ttl).map_err(|e| Error::BadRequest {
            message: format!("invalid token ttl: {e}"),
        })?;
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: expires_at.timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.jwt_secret.as_bytes())).map_err(|e| {
        Error::BadRequest {
            message: format!("failed to sign token: {e}"),
        }
    })
}

/// Validate a token and return its claims. Expired or tampered tokens
/// come back as Unauthorized.
pub fn verify(config: &AuthConfig, token: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| Error::Unauthorized {
        message: "invalid or expired token".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-at-least-32-bytes-long".to_string(),
            token_ttl: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_round_trip() {
        let config = config();
        let user_id = Uuid::new_v4();
        let token = issue(&config, user_id, "a@example.com").expect("issuing failed");
        let claims = verify(&config, &token).expect("verification failed");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "a@example.com");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue(&config(), Uuid::new_v4(), "a@example.com").expect("issuing failed");
        let other = AuthConfig {
            jwt_secret: "a-completely-different-signing-key".to_string(),
            token_ttl: Duration::from_secs(3600),
        };
        assert!(verify(&other, &token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = config();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            exp: Utc::now().timestamp() - 120,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .expect("signing failed");
        assert!(verify(&config, &token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(verify(&config(), "not.a.jwt").is_err());
    }
}

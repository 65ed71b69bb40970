//! Stripe-style webhook signature verification.
//!
//! The `Stripe-Signature` header carries `t=<unix ts>,v1=<hex hmac>[,...]`.
//! The signed message is `"{t}.{raw payload}"` under HMAC-SHA256 with the
//! endpoint secret. Deliveries older than the tolerance are rejected to
//! blunt replay of captured payloads.

use super::PaymentError;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| PaymentError::InvalidSignature("malformed timestamp".to_string()))?,
                );
            }
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".to_string()));
    }
    Ok(SignatureHeader { timestamp, signatures })
}

/// Verify a webhook delivery against the endpoint secret.
pub fn verify(payload: &[u8], header: &str, secret: &str, tolerance: Duration) -> Result<(), PaymentError> {
    let parsed = parse_header(header)?;

    let age = Utc::now().timestamp() - parsed.timestamp;
    if age.unsigned_abs() > tolerance.as_secs() {
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance".to_string()));
    }

    for candidate in &parsed.signatures {
        let Ok(candidate_bytes) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&candidate_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(PaymentError::InvalidSignature("no matching v1 signature".to_string()))
}

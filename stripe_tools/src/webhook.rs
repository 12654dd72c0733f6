//! Authentication of webhook deliveries.
//!
//! Every delivery carries a `Stripe-Signature` header of the form `t=<unix timestamp>,v1=<hex hmac>[,v1=...]`. The
//! signature is an HMAC-SHA256 over `"{timestamp}.{raw body}"` keyed with the endpoint's signing secret. Deliveries
//! older (or newer) than [`SIGNATURE_TOLERANCE_SECS`] are rejected to limit replays.
use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::WebhookError;

pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Verifies the signature header against the raw request body, using the current wall-clock time.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str) -> Result<(), WebhookError> {
    verify_webhook_signature_at(payload, header, secret, Utc::now().timestamp())
}

/// Verifies the signature header against the raw request body as if the current time were `now` (unix seconds).
pub fn verify_webhook_signature_at(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = Some(t),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }
    let ts = timestamp.parse::<i64>().map_err(|_| WebhookError::InvalidTimestamp)?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        warn!("💳️ Webhook timestamp {ts} is outside the tolerance window (now: {now})");
        return Err(WebhookError::TimestampOutOfTolerance);
    }
    let mut signed = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);
    let valid = signatures.iter().filter_map(|s| hex::decode(s).ok()).any(|expected| {
        HmacSha256::new_from_slice(secret.as_bytes())
            .map(|mut mac| {
                mac.update(&signed);
                mac.verify_slice(&expected).is_ok()
            })
            .unwrap_or(false)
    });
    if valid {
        trace!("💳️ Webhook signature verified");
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Computes the hex-encoded `v1` signature for a payload. Useful for replaying deliveries against a local server.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

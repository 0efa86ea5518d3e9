use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::AppError;
use crate::services::payments::stripe;
use crate::services::reservation;
use crate::state::AppState;

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

fn signed_mac(secret: &str, timestamp: i64, body: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    Some(mac)
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`, the value carried as `v1` in a
/// `Stripe-Signature` header.
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> Option<String> {
    let digest = signed_mac(secret, timestamp, body)?.finalize().into_bytes();
    Some(digest.iter().map(|b| format!("{b:02x}")).collect())
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

fn validate_signature(secret: &str, header: &str, body: &str, now: i64) -> Result<(), &'static str> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or("missing timestamp")?;
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("timestamp outside tolerance");
    }
    let mac = signed_mac(secret, timestamp, body).ok_or("bad secret")?;
    let matched = signatures
        .iter()
        .filter_map(|s| decode_hex(s))
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if matched {
        Ok(())
    } else {
        Err("signature mismatch")
    }
}

// POST /webhook/payments
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    // Skip signature validation if the secret is empty (dev mode)
    if !state.config.stripe_webhook_secret.is_empty() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing Stripe-Signature header");
            return Ok((StatusCode::BAD_REQUEST, "Missing signature").into_response());
        }

        let now = chrono::Utc::now().timestamp();
        if let Err(reason) = validate_signature(&state.config.stripe_webhook_secret, signature, &body, now) {
            tracing::warn!(reason, "invalid webhook signature");
            return Ok((StatusCode::BAD_REQUEST, "Invalid signature").into_response());
        }
    }

    let event = stripe::parse_event(&body).map_err(|e| AppError::Validation(format!("{e:#}")))?;
    let Some(event) = event else {
        tracing::debug!("ignoring webhook event");
        return Ok(Json(serde_json::json!({ "received": true })).into_response());
    };

    tracing::info!(
        event_id = event.event_id.as_deref().unwrap_or("-"),
        session_id = %event.session_id,
        outcome = ?event.outcome,
        "payment event"
    );

    let now = state.config.local_now();
    let outcome = {
        let mut db = state.db();
        reservation::reconcile_payment(&mut db, &event, &now)?
    };

    Ok(Json(serde_json::json!({ "received": true, "outcome": outcome })).into_response())
}

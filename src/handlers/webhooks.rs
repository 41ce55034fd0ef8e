//! Provider callbacks. Both endpoints read the raw body so the signature is
//! checked over exactly the bytes that were signed.

use crate::error::AppError;
use crate::router::AppState;
use crate::service::webhooks::{self, PlatformStripe, SignatureError, WebhookAck};
use crate::types::square::SquareEvent;
use crate::types::stripe::StripeEvent;
use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::warn;

const STRIPE_SIGNATURE: &str = "stripe-signature";
const SQUARE_SIGNATURE: &str = "x-square-hmacsha256-signature";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::Missing)
}

fn parse_event<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::validation(format!("Malformed event: {e}")))
}

pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let secret = state
        .config
        .stripe
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::validation("Stripe webhooks are not configured"))?;
    let now = Utc::now();
    header(&headers, STRIPE_SIGNATURE)
        .and_then(|sig| {
            webhooks::verify_stripe_signature(
                &body,
                sig,
                secret,
                state.config.stripe.webhook_tolerance_secs,
                now,
            )
        })
        .inspect_err(|e| warn!(error = %e, "rejected stripe webhook"))?;

    let event: StripeEvent = parse_event(&body)?;
    let platform = state
        .config
        .stripe
        .secret_key
        .as_deref()
        .map(|secret_key| PlatformStripe {
            api: &state.payments.stripe,
            secret_key,
        });
    Ok(Json(
        webhooks::apply_stripe_event(&state.storage, platform, event, now).await?,
    ))
}

pub async fn square(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let square = &state.config.square;
    let (Some(key), Some(url)) = (
        square.webhook_signature_key.as_deref(),
        square.webhook_url.as_deref(),
    ) else {
        return Err(AppError::validation("Square webhooks are not configured"));
    };
    header(&headers, SQUARE_SIGNATURE)
        .and_then(|sig| webhooks::verify_square_signature(&body, sig, key, url))
        .inspect_err(|e| warn!(error = %e, "rejected square webhook"))?;

    let event: SquareEvent = parse_event(&body)?;
    Ok(Json(
        webhooks::apply_square_event(&state.storage, event, Utc::now()).await?,
    ))
}

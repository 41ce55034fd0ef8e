//! Payment provider webhooks: signature checks and mirror updates.

use crate::api::StripeApi;
use crate::db::Storage;
use crate::db::users::SubscriptionUpdate;
use crate::error::AppError;
use crate::types::square::SquareEvent;
use crate::types::stripe::{StripeEvent, StripeInvoice, StripeSubscription};
use crate::types::{InvoiceStatus, PaymentProvider, SubscriptionStatus, Tier};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside the tolerance window")]
    Expired,
    #[error("signature does not match")]
    Mismatch,
}

impl From<SignatureError> for AppError {
    fn from(e: SignatureError) -> Self {
        AppError::Validation(format!("Invalid webhook signature: {e}"))
    }
}

fn hmac_sha256(secret: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

/// `Stripe-Signature` value for `payload` signed at `timestamp`.
pub fn stripe_signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let ts = timestamp.to_string();
    let sig = hmac_sha256(secret.as_bytes(), &[ts.as_bytes(), b".", payload]);
    format!("t={ts},v1={}", hex::encode(sig))
}

/// Check `t=<unix>,v1=<hex>[,v1=...]` against HMAC-SHA256 of `"{t}.{payload}"`.
pub fn verify_stripe_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => {
                if let Ok(bytes) = hex::decode(v) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }
    let ts_str = timestamp.ok_or(SignatureError::Malformed)?;
    let ts: i64 = ts_str.parse().map_err(|_| SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now.timestamp() - ts).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }
    let expected = hmac_sha256(secret.as_bytes(), &[ts_str.as_bytes(), b".", payload]);
    if candidates
        .iter()
        .any(|c| bool::from(c.as_slice().ct_eq(expected.as_slice())))
    {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Square signs `notification_url + body` and sends base64 in
/// `x-square-hmacsha256-signature`.
pub fn square_signature(payload: &[u8], signature_key: &str, notification_url: &str) -> String {
    STANDARD.encode(hmac_sha256(
        signature_key.as_bytes(),
        &[notification_url.as_bytes(), payload],
    ))
}

pub fn verify_square_signature(
    payload: &[u8],
    header: &str,
    signature_key: &str,
    notification_url: &str,
) -> Result<(), SignatureError> {
    let given = STANDARD
        .decode(header.trim())
        .map_err(|_| SignatureError::Malformed)?;
    let expected = hmac_sha256(
        signature_key.as_bytes(),
        &[notification_url.as_bytes(), payload],
    );
    if bool::from(given.as_slice().ct_eq(expected.as_slice())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Response body for every accepted webhook delivery.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookAck {
    pub received: bool,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InvoiceStatus>,
}

impl WebhookAck {
    fn action(action: &'static str) -> Self {
        Self {
            received: true,
            action,
            status: None,
        }
    }
}

fn stripe_invoice_target(event_type: &str) -> Option<InvoiceStatus> {
    match event_type {
        "invoice.paid" | "invoice.payment_succeeded" => Some(InvoiceStatus::Paid),
        "invoice.payment_failed" => Some(InvoiceStatus::PaymentFailed),
        "invoice.voided" => Some(InvoiceStatus::Void),
        "invoice.marked_uncollectible" => Some(InvoiceStatus::Uncollectible),
        "invoice.finalized" | "invoice.sent" => Some(InvoiceStatus::Open),
        _ => None,
    }
}

async fn apply_invoice_event(
    storage: &Storage,
    provider: PaymentProvider,
    remote_id: &str,
    next: InvoiceStatus,
    paid_at: Option<DateTime<Utc>>,
) -> Result<WebhookAck, AppError> {
    let Some(invoice) = storage
        .find_invoice_by_provider_id(provider, remote_id)
        .await?
    else {
        debug!(?provider, remote_id, "webhook for unknown invoice");
        return Ok(WebhookAck::action("unknown_invoice"));
    };
    let paid_at = match next {
        InvoiceStatus::Paid => paid_at,
        _ => None,
    };
    let status = storage.apply_invoice_status(&invoice, next, paid_at).await?;
    if status != next {
        info!(invoice_id = invoice.id, current = ?status, requested = ?next, "terminal invoice kept its status");
    }
    Ok(WebhookAck {
        received: true,
        action: "invoice_updated",
        status: Some(status),
    })
}

/// Platform Stripe account, used to look up subscriptions whose events name no plan.
#[derive(Clone, Copy)]
pub struct PlatformStripe<'a> {
    pub api: &'a StripeApi,
    pub secret_key: &'a str,
}

pub async fn apply_stripe_event(
    storage: &Storage,
    platform: Option<PlatformStripe<'_>>,
    event: StripeEvent,
    now: DateTime<Utc>,
) -> Result<WebhookAck, AppError> {
    debug!(event_id = %event.id, event_type = %event.event_type, "stripe webhook");
    if let Some(next) = stripe_invoice_target(&event.event_type) {
        let invoice: StripeInvoice = serde_json::from_value(event.data.object)
            .map_err(|e| AppError::validation(format!("Malformed invoice event: {e}")))?;
        let paid_at = invoice.paid_at().or(Some(now));
        return apply_invoice_event(storage, PaymentProvider::Stripe, &invoice.id, next, paid_at)
            .await;
    }

    match event.event_type.as_str() {
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            let sub: StripeSubscription = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::validation(format!("Malformed subscription event: {e}")))?;
            let deleted = event.event_type == "customer.subscription.deleted";
            apply_subscription(storage, platform, &sub, deleted).await
        }
        _ => Ok(WebhookAck::action("ignored")),
    }
}

async fn fetch_subscription(
    platform: Option<PlatformStripe<'_>>,
    id: &str,
) -> Option<StripeSubscription> {
    let platform = platform?;
    match platform.api.get_subscription(platform.secret_key, id).await {
        Ok(sub) => Some(sub),
        Err(e) => {
            warn!(subscription = id, error = %e, "subscription lookup failed");
            None
        }
    }
}

async fn apply_subscription(
    storage: &Storage,
    platform: Option<PlatformStripe<'_>>,
    sub: &StripeSubscription,
    deleted: bool,
) -> Result<WebhookAck, AppError> {
    let Some(user) = storage
        .find_user_by_stripe_ids(&sub.id, Some(&sub.customer))
        .await?
    else {
        warn!(subscription = %sub.id, customer = %sub.customer, "subscription for unknown customer");
        return Ok(WebhookAck::action("unknown_customer"));
    };

    let fetched = if !deleted && sub.tier().is_none() {
        fetch_subscription(platform, &sub.id).await
    } else {
        None
    };
    let sub = fetched.as_ref().unwrap_or(sub);
    let tier = sub.tier().unwrap_or(user.subscription_tier);
    let update = if deleted {
        SubscriptionUpdate {
            tier: Tier::Free,
            status: SubscriptionStatus::Canceled,
            price: None,
            start: None,
            end: sub.period_end().or(user.subscription_end),
            stripe_customer_id: Some(sub.customer.clone()),
            stripe_subscription_id: Some(sub.id.clone()),
        }
    } else {
        SubscriptionUpdate {
            tier,
            status: sub.local_status(),
            price: sub
                .price_amount()
                .or(Some(tier.default_monthly_price())),
            start: sub.period_start(),
            end: sub.period_end(),
            stripe_customer_id: Some(sub.customer.clone()),
            stripe_subscription_id: Some(sub.id.clone()),
        }
    };
    storage.update_subscription(user.id, &update).await?;
    info!(user_id = user.id, tier = ?update.tier, status = ?update.status, "subscription mirrored");
    Ok(WebhookAck::action("subscription_updated"))
}

pub async fn apply_square_event(
    storage: &Storage,
    event: SquareEvent,
    now: DateTime<Utc>,
) -> Result<WebhookAck, AppError> {
    debug!(event_id = event.event_id.as_deref().unwrap_or(""), event_type = %event.event_type, "square webhook");
    let Some(invoice) = event.data.object.invoice else {
        return Ok(WebhookAck::action("ignored"));
    };
    let next = match event.event_type.as_str() {
        "invoice.payment_made" => Some(InvoiceStatus::Paid),
        "invoice.canceled" => Some(InvoiceStatus::Void),
        "invoice.updated" | "invoice.published" | "invoice.scheduled_charge_failed" => {
            invoice.local_status()
        }
        _ => None,
    };
    match next {
        Some(next) => {
            apply_invoice_event(storage, PaymentProvider::Square, &invoice.id, next, Some(now))
                .await
        }
        None => Ok(WebhookAck::action("ignored")),
    }
}

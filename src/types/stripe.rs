//! Subset of Stripe's REST and webhook payloads that the service reads.

use super::{InvoiceStatus, SubscriptionStatus, Tier};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusTransitions {
    pub paid_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status_transitions: StatusTransitions,
}

impl StripeInvoice {
    pub fn local_status(&self) -> Option<InvoiceStatus> {
        match self.status.as_deref()? {
            "draft" => Some(InvoiceStatus::Draft),
            "open" => Some(InvoiceStatus::Open),
            "paid" => Some(InvoiceStatus::Paid),
            "void" => Some(InvoiceStatus::Void),
            "uncollectible" => Some(InvoiceStatus::Uncollectible),
            _ => None,
        }
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.status_transitions
            .paid_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripePrice {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    #[serde(default)]
    pub price: StripePrice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

// Derived `Default` would demand `T: Default`.
impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
}

fn day(ts: Option<i64>) -> Option<NaiveDate> {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|dt| dt.date_naive())
}

impl StripeSubscription {
    fn price(&self) -> Option<&StripePrice> {
        self.items.data.first().map(|item| &item.price)
    }

    /// Tier from subscription metadata, then price metadata, then the price nickname.
    pub fn tier(&self) -> Option<Tier> {
        let price = self.price();
        [
            self.metadata.get("tier"),
            price.and_then(|p| p.metadata.get("tier")),
            price.and_then(|p| p.nickname.as_ref()),
        ]
        .into_iter()
        .flatten()
        .find_map(|v| v.parse().ok())
    }

    pub fn local_status(&self) -> SubscriptionStatus {
        self.status.parse().unwrap_or(SubscriptionStatus::Inactive)
    }

    /// Monthly price in major units.
    pub fn price_amount(&self) -> Option<f64> {
        self.price()?.unit_amount.map(|cents| cents as f64 / 100.0)
    }

    pub fn period_start(&self) -> Option<NaiveDate> {
        day(self.current_period_start)
    }

    pub fn period_end(&self) -> Option<NaiveDate> {
        day(self.current_period_end)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

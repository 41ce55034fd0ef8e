use crate::service::profit;
use crate::types::{
    ContactType, InvoiceStatus, LeadStatus, PaymentProvider, PromoStatus, SubscriptionStatus,
    Tier, TokenKind, UserStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type UserId = i64;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: UserStatus,
    pub is_admin: bool,
    pub subscription_tier: Tier,
    pub subscription_status: SubscriptionStatus,
    pub subscription_price: Option<f64>,
    pub subscription_start: Option<NaiveDate>,
    pub subscription_end: Option<NaiveDate>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_publishable_key: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_secret_key: Option<String>,
    #[serde(skip_serializing)]
    pub square_access_token: Option<String>,
    pub square_location_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Tier that currently applies; lapsed subscriptions fall back to free.
    pub fn effective_tier(&self) -> Tier {
        if self.subscription_status.grants_tier() {
            self.subscription_tier
        } else {
            Tier::Free
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            has_stripe_secret: self.stripe_secret_key.is_some(),
            has_square_token: self.square_access_token.is_some(),
            effective_tier: self.effective_tier(),
            user: self.clone(),
        }
    }
}

/// User as returned by the API: secrets stripped, presence flags added.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub has_stripe_secret: bool,
    pub has_square_token: bool,
    pub effective_tier: Tier,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserToken {
    pub id: i64,
    pub user_id: UserId,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Watch {
    pub id: i64,
    pub user_id: UserId,
    pub brand: String,
    pub model: String,
    pub reference_number: Option<String>,
    pub serial_number: Option<String>,
    pub year: Option<i64>,
    pub condition: Option<String>,
    pub accessories: Option<String>,
    pub date_purchased: Option<NaiveDate>,
    pub purchased_from: Option<String>,
    pub purchase_price: Option<f64>,
    pub seller_contact_id: Option<i64>,
    pub date_sold: Option<NaiveDate>,
    pub sold_platform: Option<String>,
    pub price_sold: Option<f64>,
    pub buyer_contact_id: Option<i64>,
    pub platform_fees: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub taxes: Option<f64>,
    pub accessories_cost: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Watch {
    pub fn is_sold(&self) -> bool {
        self.price_sold.is_some()
    }

    pub fn view(self) -> WatchView {
        WatchView {
            profit: profit::watch_profit(&self),
            watch: self,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchView {
    #[serde(flatten)]
    pub watch: Watch,
    pub profit: Option<f64>,
}

/// Writable watch fields, shared by create, update and import.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchInput {
    pub brand: String,
    pub model: String,
    pub reference_number: Option<String>,
    pub serial_number: Option<String>,
    pub year: Option<i64>,
    pub condition: Option<String>,
    pub accessories: Option<String>,
    pub date_purchased: Option<String>,
    pub purchased_from: Option<String>,
    pub purchase_price: Option<f64>,
    pub seller_contact_id: Option<i64>,
    pub date_sold: Option<String>,
    pub sold_platform: Option<String>,
    pub price_sold: Option<f64>,
    pub buyer_contact_id: Option<i64>,
    pub platform_fees: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub taxes: Option<f64>,
    pub accessories_cost: Option<f64>,
    pub notes: Option<String>,
}

/// `WatchInput` after validation: trimmed strings, parsed dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchRecord {
    pub brand: String,
    pub model: String,
    pub reference_number: Option<String>,
    pub serial_number: Option<String>,
    pub year: Option<i64>,
    pub condition: Option<String>,
    pub accessories: Option<String>,
    pub date_purchased: Option<NaiveDate>,
    pub purchased_from: Option<String>,
    pub purchase_price: Option<f64>,
    pub seller_contact_id: Option<i64>,
    pub date_sold: Option<NaiveDate>,
    pub sold_platform: Option<String>,
    pub price_sold: Option<f64>,
    pub buyer_contact_id: Option<i64>,
    pub platform_fees: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub taxes: Option<f64>,
    pub accessories_cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_type: ContactType,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub square_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.company.clone().unwrap_or_default()
        } else {
            full
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContactInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub contact_type: Option<ContactType>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Lead {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub status: LeadStatus,
    pub contact_id: Option<i64>,
    pub watch_id: Option<i64>,
    pub reminder_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadInput {
    pub title: String,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub contact_id: Option<i64>,
    #[serde(default)]
    pub watch_id: Option<i64>,
    #[serde(default)]
    pub reminder_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub title: String,
    pub status: LeadStatus,
    pub contact_id: Option<i64>,
    pub watch_id: Option<i64>,
    pub reminder_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Card {
    pub id: i64,
    pub contact_id: i64,
    pub brand: Option<String>,
    pub last4: String,
    pub exp_month: i64,
    pub exp_year: i64,
    pub cardholder_name: Option<String>,
    pub provider_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardInput {
    #[serde(default)]
    pub brand: Option<String>,
    pub last4: String,
    pub exp_month: i64,
    pub exp_year: i64,
    #[serde(default)]
    pub cardholder_name: Option<String>,
    #[serde(default)]
    pub provider_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub user_id: UserId,
    pub contact_id: Option<i64>,
    pub watch_id: Option<i64>,
    pub provider: PaymentProvider,
    pub provider_invoice_id: Option<String>,
    pub number: Option<String>,
    pub status: InvoiceStatus,
    pub currency: String,
    pub total: f64,
    pub due_date: Option<NaiveDate>,
    pub hosted_url: Option<String>,
    pub memo: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct InvoiceItem {
    #[serde(default, skip_deserializing)]
    pub id: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PromoSignup {
    pub id: i64,
    pub campaign: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub status: PromoStatus,
    pub user_id: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromoSignupInput {
    pub campaign: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

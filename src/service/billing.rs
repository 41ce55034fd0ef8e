//! Invoice creation and voiding against the seller's payment provider.
//!
//! The provider call sequence runs first; the local mirror is only written
//! once the invoice exists upstream.

use crate::api::{Payments, SquareLine, StripeLine};
use crate::db::Storage;
use crate::db::invoices::NewInvoice;
use crate::db::models::{Contact, InvoiceDetail, InvoiceItem, User};
use crate::error::AppError;
use crate::service::validation::{clean, parse_optional_date};
use crate::types::square::{CurrencyCode, Money};
use crate::types::{InvoiceStatus, PaymentProvider};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::info;

pub const DEFAULT_DAYS_UNTIL_DUE: i64 = 14;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceRequest {
    pub contact_id: i64,
    #[serde(default)]
    pub watch_id: Option<i64>,
    #[serde(default)]
    pub provider: Option<PaymentProvider>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoicePlan {
    pub contact_id: i64,
    pub watch_id: Option<i64>,
    pub provider: PaymentProvider,
    pub currency: CurrencyCode,
    pub due_date: NaiveDate,
    pub days_until_due: i64,
    pub items: Vec<InvoiceItem>,
    pub total: f64,
    pub memo: Option<String>,
}

fn minor_scale(currency: CurrencyCode) -> f64 {
    10f64.powi(currency.exponent() as i32)
}

/// Amount in the currency's smallest unit: cents for USD, yen for JPY.
pub fn to_minor_units(amount: f64, currency: CurrencyCode) -> i64 {
    (amount * minor_scale(currency)).round() as i64
}

pub fn from_minor_units(units: i64, currency: CurrencyCode) -> f64 {
    units as f64 / minor_scale(currency)
}

/// Round to the precision the currency can be billed in.
pub fn round_to_currency(amount: f64, currency: CurrencyCode) -> f64 {
    from_minor_units(to_minor_units(amount, currency), currency)
}

pub fn plan_invoice(req: CreateInvoiceRequest, today: NaiveDate) -> Result<InvoicePlan, AppError> {
    if req.items.is_empty() {
        return Err(AppError::validation("An invoice needs at least one item"));
    }
    let currency = match req.currency.as_deref() {
        Some(code) => CurrencyCode::parse(code)
            .ok_or_else(|| AppError::validation("currency must be a three-letter code"))?,
        None => CurrencyCode::USD,
    };
    let mut items = Vec::with_capacity(req.items.len());
    for (i, item) in req.items.into_iter().enumerate() {
        let n = i + 1;
        let description = item.description.trim().to_string();
        if description.is_empty() {
            return Err(AppError::validation(format!("Item {n} needs a description")));
        }
        if item.quantity < 1 {
            return Err(AppError::validation(format!("Item {n} quantity must be at least 1")));
        }
        let unit_price = if item.unit_price.is_finite() {
            round_to_currency(item.unit_price, currency)
        } else {
            0.0
        };
        if unit_price <= 0.0 {
            return Err(AppError::validation(format!(
                "Item {n} unit price must be at least one {} minor unit",
                currency.as_str()
            )));
        }
        items.push(InvoiceItem {
            id: 0,
            description,
            quantity: item.quantity,
            unit_price,
        });
    }
    let total = round_to_currency(
        items
            .iter()
            .map(|i| i.quantity as f64 * i.unit_price)
            .sum(),
        currency,
    );

    let due_date = parse_optional_date("due_date", req.due_date.as_deref())?
        .unwrap_or(today + Duration::days(DEFAULT_DAYS_UNTIL_DUE));
    if due_date < today {
        return Err(AppError::validation("due_date cannot be in the past"));
    }

    Ok(InvoicePlan {
        contact_id: req.contact_id,
        watch_id: req.watch_id,
        provider: req.provider.unwrap_or_default(),
        currency,
        due_date,
        days_until_due: (due_date - today).num_days(),
        items,
        total,
        memo: clean(req.memo),
    })
}

pub async fn create_invoice(
    storage: &Storage,
    payments: &Payments,
    user: &User,
    req: CreateInvoiceRequest,
    today: NaiveDate,
) -> Result<InvoiceDetail, AppError> {
    let plan = plan_invoice(req, today)?;
    let contact = storage
        .get_contact(user.id, plan.contact_id)
        .await?
        .ok_or_else(|| AppError::validation("contact_id does not match one of your contacts"))?;
    if let Some(watch_id) = plan.watch_id
        && !storage.watch_exists(user.id, watch_id).await?
    {
        return Err(AppError::validation("watch_id does not match one of your watches"));
    }

    let mirror = match plan.provider {
        PaymentProvider::Stripe => stripe_invoice(storage, payments, user, &contact, &plan).await?,
        PaymentProvider::Square => square_invoice(storage, payments, user, &contact, &plan).await?,
    };
    info!(
        user_id = user.id,
        provider = ?mirror.provider,
        provider_invoice_id = mirror.provider_invoice_id.as_deref().unwrap_or(""),
        total = mirror.total,
        "invoice sent"
    );
    storage.insert_invoice(user.id, &mirror, &plan.items).await
}

async fn stripe_invoice(
    storage: &Storage,
    payments: &Payments,
    user: &User,
    contact: &Contact,
    plan: &InvoicePlan,
) -> Result<NewInvoice, AppError> {
    let key = user
        .stripe_secret_key
        .as_deref()
        .ok_or_else(|| AppError::validation("Add your Stripe secret key before creating invoices"))?;
    let stripe = &payments.stripe;

    let customer = match &contact.stripe_customer_id {
        Some(id) => id.clone(),
        None => {
            let created = stripe.create_customer(key, contact).await?;
            storage
                .set_contact_stripe_customer(contact.id, &created.id)
                .await?;
            created.id
        }
    };

    let currency = plan.currency.as_str().to_ascii_lowercase();
    let draft = stripe
        .create_invoice(
            key,
            &customer,
            &currency,
            plan.days_until_due,
            plan.memo.as_deref(),
            plan.watch_id,
        )
        .await?;
    for item in &plan.items {
        let line = StripeLine {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_amount: to_minor_units(item.unit_price, plan.currency),
        };
        stripe
            .add_invoice_item(key, &customer, &draft.id, &currency, &line)
            .await?;
    }
    let finalized = stripe.finalize_invoice(key, &draft.id).await?;
    let sent = stripe.send_invoice(key, &finalized.id).await?;

    Ok(NewInvoice {
        contact_id: Some(contact.id),
        watch_id: plan.watch_id,
        provider: PaymentProvider::Stripe,
        status: sent.local_status().unwrap_or(InvoiceStatus::Open),
        number: sent.number.clone().or(finalized.number),
        hosted_url: sent.hosted_invoice_url.clone().or(finalized.hosted_invoice_url),
        total: sent
            .total
            .map(|units| from_minor_units(units, plan.currency))
            .unwrap_or(plan.total),
        provider_invoice_id: Some(sent.id),
        currency,
        due_date: Some(plan.due_date),
        memo: plan.memo.clone(),
    })
}

async fn square_invoice(
    storage: &Storage,
    payments: &Payments,
    user: &User,
    contact: &Contact,
    plan: &InvoicePlan,
) -> Result<NewInvoice, AppError> {
    let (Some(token), Some(location)) = (
        user.square_access_token.as_deref(),
        user.square_location_id.as_deref(),
    ) else {
        return Err(AppError::validation(
            "Add your Square access token and location before creating invoices",
        ));
    };
    let square = &payments.square;

    let customer = match &contact.square_customer_id {
        Some(id) => id.clone(),
        None => {
            let created = square.create_customer(token, contact).await?.customer;
            storage
                .set_contact_square_customer(contact.id, &created.id)
                .await?;
            created.id
        }
    };

    let lines: Vec<SquareLine> = plan
        .items
        .iter()
        .map(|item| SquareLine {
            name: item.description.clone(),
            quantity: item.quantity,
            base_price: Money {
                amount: to_minor_units(item.unit_price, plan.currency),
                currency: plan.currency,
            },
        })
        .collect();
    let order = square
        .create_order(token, location, &customer, &lines)
        .await?
        .order;
    let draft = square
        .create_invoice(
            token,
            location,
            &order.id,
            &customer,
            plan.due_date,
            plan.memo.as_deref(),
        )
        .await?
        .invoice;
    let published = square.publish_invoice(token, &draft).await?;

    Ok(NewInvoice {
        contact_id: Some(contact.id),
        watch_id: plan.watch_id,
        provider: PaymentProvider::Square,
        status: published.local_status().unwrap_or(InvoiceStatus::Open),
        number: published.invoice_number.clone(),
        hosted_url: published.public_url.clone(),
        total: order
            .total_money
            .map(|m| from_minor_units(m.amount, m.currency))
            .unwrap_or(plan.total),
        provider_invoice_id: Some(published.id),
        currency: plan.currency.as_str().to_ascii_lowercase(),
        due_date: Some(plan.due_date),
        memo: plan.memo.clone(),
    })
}

/// Void upstream, then locally. Voiding a void invoice is a no-op.
pub async fn void_invoice(
    storage: &Storage,
    payments: &Payments,
    user: &User,
    id: i64,
) -> Result<InvoiceDetail, AppError> {
    let invoice = storage
        .get_invoice(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))?;
    match invoice.status {
        InvoiceStatus::Void => {}
        InvoiceStatus::Paid => {
            return Err(AppError::Conflict("Paid invoices cannot be voided".to_string()));
        }
        _ => {
            if let Some(remote_id) = invoice.provider_invoice_id.as_deref() {
                match invoice.provider {
                    PaymentProvider::Stripe => {
                        let key = user.stripe_secret_key.as_deref().ok_or_else(|| {
                            AppError::validation("Add your Stripe secret key before voiding invoices")
                        })?;
                        payments.stripe.void_invoice(key, remote_id).await?;
                    }
                    PaymentProvider::Square => {
                        let token = user.square_access_token.as_deref().ok_or_else(|| {
                            AppError::validation("Add your Square access token before voiding invoices")
                        })?;
                        payments.square.cancel_invoice(token, remote_id).await?;
                    }
                }
            }
            let status = storage
                .apply_invoice_status(&invoice, InvoiceStatus::Void, None)
                .await?;
            if status != InvoiceStatus::Void {
                return Err(AppError::Conflict(format!(
                    "Invoice became {} before it could be voided",
                    format!("{status:?}").to_lowercase()
                )));
            }
            info!(user_id = user.id, invoice_id = id, "invoice voided");
        }
    }
    storage
        .get_invoice_detail(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))
}

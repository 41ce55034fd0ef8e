//! Input checks shared by the HTTP handlers and the CSV importer.

use crate::db::models::{CardInput, ContactInput, LeadInput, LeadRecord, WatchInput, WatchRecord};
use crate::error::AppError;
use crate::types::LeadStatus;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("username regex"));

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_ascii_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email address"));
    }
    Ok(email)
}

pub fn check_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::validation(
            "Username must be 3-32 characters of letters, digits, '.', '_' or '-'",
        ));
    }
    Ok(username.to_string())
}

pub fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Strict `YYYY-MM-DD` parsing for API input.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    let value = value.trim();
    if !DATE_RE.is_match(value) {
        return Err(AppError::validation(format!("{field} must be YYYY-MM-DD")));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{field} is not a valid date")))
}

pub fn parse_optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(field, v).map(Some),
        None => Ok(None),
    }
}

/// Trim and drop empty strings.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_negative(field: &str, value: Option<f64>) -> Result<Option<f64>, AppError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => {
            Err(AppError::validation(format!("{field} must be a non-negative amount")))
        }
        other => Ok(other),
    }
}

pub fn validate_watch(input: WatchInput) -> Result<WatchRecord, AppError> {
    let brand = input.brand.trim().to_string();
    let model = input.model.trim().to_string();
    if brand.is_empty() {
        return Err(AppError::validation("brand is required"));
    }
    if model.is_empty() {
        return Err(AppError::validation("model is required"));
    }
    if let Some(year) = input.year
        && !(1800..=2200).contains(&year)
    {
        return Err(AppError::validation("year is out of range"));
    }

    let date_purchased = parse_optional_date("date_purchased", input.date_purchased.as_deref())?;
    let date_sold = parse_optional_date("date_sold", input.date_sold.as_deref())?;
    let price_sold = non_negative("price_sold", input.price_sold)?;

    if price_sold.is_some() != date_sold.is_some() {
        return Err(AppError::validation(
            "price_sold and date_sold must be provided together",
        ));
    }
    if let (Some(bought), Some(sold)) = (date_purchased, date_sold)
        && sold < bought
    {
        return Err(AppError::validation("date_sold cannot be before date_purchased"));
    }

    Ok(WatchRecord {
        brand,
        model,
        reference_number: clean(input.reference_number),
        serial_number: clean(input.serial_number),
        year: input.year,
        condition: clean(input.condition),
        accessories: clean(input.accessories),
        date_purchased,
        purchased_from: clean(input.purchased_from),
        purchase_price: non_negative("purchase_price", input.purchase_price)?,
        seller_contact_id: input.seller_contact_id,
        date_sold,
        sold_platform: clean(input.sold_platform),
        price_sold,
        buyer_contact_id: input.buyer_contact_id,
        platform_fees: non_negative("platform_fees", input.platform_fees)?,
        shipping_cost: non_negative("shipping_cost", input.shipping_cost)?,
        taxes: non_negative("taxes", input.taxes)?,
        accessories_cost: non_negative("accessories_cost", input.accessories_cost)?,
        notes: clean(input.notes),
    })
}

pub fn validate_contact(input: ContactInput) -> Result<ContactInput, AppError> {
    let c = ContactInput {
        first_name: clean(input.first_name),
        last_name: clean(input.last_name),
        company: clean(input.company),
        email: clean(input.email).map(|e| e.to_ascii_lowercase()),
        phone: clean(input.phone),
        contact_type: input.contact_type,
        address_line1: clean(input.address_line1),
        address_line2: clean(input.address_line2),
        city: clean(input.city),
        state: clean(input.state),
        postal_code: clean(input.postal_code),
        country: clean(input.country),
        notes: clean(input.notes),
    };
    if c.first_name.is_none() && c.last_name.is_none() && c.company.is_none() {
        return Err(AppError::validation(
            "A first name, last name or company is required",
        ));
    }
    if let Some(email) = c.email.as_deref()
        && !is_valid_email(email)
    {
        return Err(AppError::validation("Invalid email address"));
    }
    Ok(c)
}

pub fn validate_lead(input: LeadInput) -> Result<LeadRecord, AppError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    Ok(LeadRecord {
        title,
        status: input.status.unwrap_or(LeadStatus::New),
        contact_id: input.contact_id,
        watch_id: input.watch_id,
        reminder_date: parse_optional_date("reminder_date", input.reminder_date.as_deref())?,
        notes: clean(input.notes),
    })
}

/// Card metadata is display-only; anything resembling a full number is refused.
pub fn validate_card(input: CardInput, today: NaiveDate) -> Result<CardInput, AppError> {
    let last4 = input.last4.trim().to_string();
    if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("last4 must be exactly four digits"));
    }
    if !(1..=12).contains(&input.exp_month) {
        return Err(AppError::validation("exp_month must be between 1 and 12"));
    }
    if input.exp_year < 2000 {
        return Err(AppError::validation("exp_year must be a four-digit year"));
    }
    let current = (i64::from(today.year()), i64::from(today.month()));
    if (input.exp_year, input.exp_month) < current {
        return Err(AppError::validation("Card is expired"));
    }
    Ok(CardInput {
        last4,
        brand: clean(input.brand),
        cardholder_name: clean(input.cardholder_name),
        provider_token: clean(input.provider_token),
        exp_month: input.exp_month,
        exp_year: input.exp_year,
    })
}

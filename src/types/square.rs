//! Subset of Square's v2 REST and webhook payloads.

use super::InvoiceStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    /// Smallest currency unit.
    pub amount: i64,
    pub currency: CurrencyCode,
}

/// Upper-case ISO 4217 code as Square expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub const USD: Self = Self(*b"USD");

    pub fn parse(code: &str) -> Option<Self> {
        let bytes = code.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return None;
        }
        Some(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("USD")
    }

    /// Decimal places of the currency's smallest unit, as Stripe and Square count them.
    pub fn exponent(&self) -> u32 {
        let code = self.as_str();
        if ZERO_DECIMAL.contains(&code) {
            0
        } else if THREE_DECIMAL.contains(&code) {
            3
        } else {
            2
        }
    }
}

const ZERO_DECIMAL: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND",
    "VUV", "XAF", "XOF", "XPF",
];

const THREE_DECIMAL: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

impl Serialize for CurrencyCode {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Self::parse(&raw).ok_or_else(|| serde::de::Error::custom("invalid currency code"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareCustomer {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerResponse {
    pub customer: SquareCustomer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareOrder {
    pub id: String,
    #[serde(default)]
    pub total_money: Option<Money>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub order: SquareOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareInvoice {
    pub id: String,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
}

impl SquareInvoice {
    pub fn local_status(&self) -> Option<InvoiceStatus> {
        match self.status.as_deref()? {
            "DRAFT" => Some(InvoiceStatus::Draft),
            "UNPAID" | "SCHEDULED" | "PARTIALLY_PAID" | "PAYMENT_PENDING" => {
                Some(InvoiceStatus::Open)
            }
            "PAID" => Some(InvoiceStatus::Paid),
            "CANCELED" => Some(InvoiceStatus::Void),
            "FAILED" => Some(InvoiceStatus::PaymentFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceResponse {
    pub invoice: SquareInvoice,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareErrorBody {
    #[serde(default)]
    pub errors: Vec<SquareErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Webhook envelope: `{"type": "invoice.payment_made", "data": {"object": {"invoice": {...}}}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SquareEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub event_id: Option<String>,
    pub data: SquareEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SquareEventData {
    #[serde(default)]
    pub object: SquareEventObject,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SquareEventObject {
    #[serde(default)]
    pub invoice: Option<SquareInvoice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(CurrencyCode::parse("usd").map(|c| c.as_str().to_string()), Some("USD".into()));
        assert!(CurrencyCode::parse("us").is_none());
        assert!(CurrencyCode::parse("u$d").is_none());
    }

    #[test]
    fn currency_exponents() {
        let exp = |c: &str| CurrencyCode::parse(c).map(|c| c.exponent());
        assert_eq!(exp("usd"), Some(2));
        assert_eq!(exp("JPY"), Some(0));
        assert_eq!(exp("krw"), Some(0));
        assert_eq!(exp("KWD"), Some(3));
    }

    #[test]
    fn webhook_envelope_parses() {
        let ev: SquareEvent = serde_json::from_str(
            r#"{"merchant_id":"M","type":"invoice.payment_made","event_id":"e1",
                "data":{"type":"invoice","id":"inv:1","object":{"invoice":{"id":"inv:1","version":3,"status":"PAID"}}}}"#,
        )
        .unwrap();
        let invoice = ev.data.object.invoice.unwrap();
        assert_eq!(invoice.local_status(), Some(InvoiceStatus::Paid));
        assert_eq!(invoice.version, Some(3));
    }
}

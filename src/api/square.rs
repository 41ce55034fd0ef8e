use crate::db::models::Contact;
use crate::error::AppError;
use crate::types::square::{
    CustomerResponse, InvoiceResponse, Money, OrderResponse, SquareErrorBody, SquareInvoice,
};
use backon::{ExponentialBuilder, Retryable};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{error, warn};
use url::Url;

/// JSON calls against Square's v2 API with the seller's access token.
#[derive(Clone)]
pub struct SquareApi {
    http: reqwest::Client,
    base: Url,
    version: String,
    retry_policy: ExponentialBuilder,
}

#[derive(Debug, Clone)]
pub struct SquareLine {
    pub name: String,
    pub quantity: i64,
    pub base_price: Money,
}

fn idempotency_key() -> String {
    crate::service::auth::generate_mail_token()
}

impl SquareApi {
    pub fn new(
        http: reqwest::Client,
        base: Url,
        version: String,
        retry_policy: ExponentialBuilder,
    ) -> Self {
        Self {
            http,
            base,
            version,
            retry_policy,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        token: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, AppError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| AppError::Provider(format!("bad Square URL {path}: {e}")))?;
        let resp = (|| async {
            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(token)
                .header("Square-Version", &self.version);
            if let Some(body) = body {
                req = req.json(body);
            }
            let resp = req.send().await?;
            if resp.status().is_server_error() {
                error!("Square server error (will retry): {}", resp.status());
                resp.error_for_status_ref()?;
            }
            Ok::<_, reqwest::Error>(resp)
        })
        .retry(self.retry_policy)
        .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SquareErrorBody>(&body)
                .ok()
                .and_then(|b| b.errors.into_iter().next())
                .and_then(|e| e.detail.or(e.code))
                .unwrap_or_else(|| format!("Square returned {status}"));
            warn!(%status, path, "Square request rejected: {}", message);
            return Err(AppError::Provider(message));
        }
        Ok(resp.json::<T>().await?)
    }

    pub async fn create_customer(
        &self,
        token: &str,
        contact: &Contact,
    ) -> Result<CustomerResponse, AppError> {
        let body = json!({
            "idempotency_key": idempotency_key(),
            "given_name": contact.first_name,
            "family_name": contact.last_name,
            "company_name": contact.company,
            "email_address": contact.email,
            "phone_number": contact.phone,
            "reference_id": contact.id.to_string(),
        });
        self.call(reqwest::Method::POST, token, "customers", Some(&body))
            .await
    }

    pub async fn create_order(
        &self,
        token: &str,
        location_id: &str,
        customer_id: &str,
        lines: &[SquareLine],
    ) -> Result<OrderResponse, AppError> {
        let line_items: Vec<Value> = lines
            .iter()
            .map(|l| {
                json!({
                    "name": l.name,
                    "quantity": l.quantity.to_string(),
                    "base_price_money": l.base_price,
                })
            })
            .collect();
        let body = json!({
            "idempotency_key": idempotency_key(),
            "order": {
                "location_id": location_id,
                "customer_id": customer_id,
                "line_items": line_items,
            }
        });
        self.call(reqwest::Method::POST, token, "orders", Some(&body))
            .await
    }

    pub async fn create_invoice(
        &self,
        token: &str,
        location_id: &str,
        order_id: &str,
        customer_id: &str,
        due_date: NaiveDate,
        memo: Option<&str>,
    ) -> Result<InvoiceResponse, AppError> {
        let body = json!({
            "idempotency_key": idempotency_key(),
            "invoice": {
                "location_id": location_id,
                "order_id": order_id,
                "primary_recipient": {"customer_id": customer_id},
                "payment_requests": [{
                    "request_type": "BALANCE",
                    "due_date": due_date.format("%Y-%m-%d").to_string(),
                }],
                "delivery_method": "EMAIL",
                "accepted_payment_methods": {"card": true},
                "description": memo,
            }
        });
        self.call(reqwest::Method::POST, token, "invoices", Some(&body))
            .await
    }

    pub async fn get_invoice(&self, token: &str, id: &str) -> Result<SquareInvoice, AppError> {
        let resp: InvoiceResponse = self
            .call(reqwest::Method::GET, token, &format!("invoices/{id}"), None)
            .await?;
        Ok(resp.invoice)
    }

    pub async fn publish_invoice(
        &self,
        token: &str,
        invoice: &SquareInvoice,
    ) -> Result<SquareInvoice, AppError> {
        let body = json!({
            "version": invoice.version.unwrap_or(0),
            "idempotency_key": idempotency_key(),
        });
        let resp: InvoiceResponse = self
            .call(
                reqwest::Method::POST,
                token,
                &format!("invoices/{}/publish", invoice.id),
                Some(&body),
            )
            .await?;
        Ok(resp.invoice)
    }

    /// Square needs the current version to cancel, so fetch it first.
    pub async fn cancel_invoice(&self, token: &str, id: &str) -> Result<SquareInvoice, AppError> {
        let current = self.get_invoice(token, id).await?;
        let body = json!({"version": current.version.unwrap_or(0)});
        let resp: InvoiceResponse = self
            .call(
                reqwest::Method::POST,
                token,
                &format!("invoices/{id}/cancel"),
                Some(&body),
            )
            .await?;
        Ok(resp.invoice)
    }
}

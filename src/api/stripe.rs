use crate::db::models::Contact;
use crate::error::AppError;
use crate::types::stripe::{StripeCustomer, StripeErrorBody, StripeInvoice, StripeSubscription};
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use tracing::{error, warn};
use url::Url;

/// Form-encoded calls against the Stripe REST API, authenticated with the
/// seller's own secret key or, for subscriptions, the platform key.
#[derive(Clone)]
pub struct StripeApi {
    http: reqwest::Client,
    base: Url,
    retry_policy: ExponentialBuilder,
}

/// Line to bill, amounts in the smallest currency unit.
#[derive(Debug, Clone)]
pub struct StripeLine {
    pub description: String,
    pub quantity: i64,
    pub unit_amount: i64,
}

fn idempotency_key() -> String {
    crate::service::auth::generate_mail_token()
}

impl StripeApi {
    pub fn new(http: reqwest::Client, base: Url, retry_policy: ExponentialBuilder) -> Self {
        Self {
            http,
            base,
            retry_policy,
        }
    }

    fn url(&self, path: &str) -> Result<Url, AppError> {
        self.base
            .join(path)
            .map_err(|e| AppError::Provider(format!("bad Stripe URL {path}: {e}")))
    }

    /// Call with retries on transport errors and 5xx. POSTs carry a single
    /// idempotency key across every attempt so Stripe never applies them twice.
    async fn call<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        key: &str,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, AppError> {
        let url = self.url(path)?;
        let idem = (method == reqwest::Method::POST).then(idempotency_key);
        let resp = (|| async {
            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(key);
            if let Some(idem) = &idem {
                req = req.header("Idempotency-Key", idem).form(form);
            }
            let resp = req.send().await?;
            if resp.status().is_server_error() {
                error!("Stripe server error (will retry): {}", resp.status());
                resp.error_for_status_ref()?;
            }
            Ok::<_, reqwest::Error>(resp)
        })
        .retry(self.retry_policy)
        .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("Stripe returned {status}"));
            warn!(%status, path, "Stripe request rejected: {}", message);
            return Err(AppError::Provider(message));
        }
        Ok(resp.json::<T>().await?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        key: &str,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, AppError> {
        self.call(reqwest::Method::POST, key, path, form).await
    }

    pub async fn create_customer(
        &self,
        key: &str,
        contact: &Contact,
    ) -> Result<StripeCustomer, AppError> {
        let mut form = vec![
            ("name".to_string(), contact.display_name()),
            ("metadata[contact_id]".to_string(), contact.id.to_string()),
        ];
        let optional = [
            ("email", &contact.email),
            ("phone", &contact.phone),
            ("address[line1]", &contact.address_line1),
            ("address[line2]", &contact.address_line2),
            ("address[city]", &contact.city),
            ("address[state]", &contact.state),
            ("address[postal_code]", &contact.postal_code),
            ("address[country]", &contact.country),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                form.push((name.to_string(), v.clone()));
            }
        }
        self.post(key, "customers", &form).await
    }

    /// Draft invoice that only collects the items attached to it explicitly.
    pub async fn create_invoice(
        &self,
        key: &str,
        customer: &str,
        currency: &str,
        days_until_due: i64,
        memo: Option<&str>,
        watch_id: Option<i64>,
    ) -> Result<StripeInvoice, AppError> {
        let mut form = vec![
            ("customer".to_string(), customer.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("collection_method".to_string(), "send_invoice".to_string()),
            ("days_until_due".to_string(), days_until_due.to_string()),
            ("pending_invoice_items_behavior".to_string(), "exclude".to_string()),
        ];
        if let Some(memo) = memo {
            form.push(("description".to_string(), memo.to_string()));
        }
        if let Some(id) = watch_id {
            form.push(("metadata[watch_id]".to_string(), id.to_string()));
        }
        self.post(key, "invoices", &form).await
    }

    pub async fn add_invoice_item(
        &self,
        key: &str,
        customer: &str,
        invoice: &str,
        currency: &str,
        line: &StripeLine,
    ) -> Result<serde_json::Value, AppError> {
        let form = vec![
            ("customer".to_string(), customer.to_string()),
            ("invoice".to_string(), invoice.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("description".to_string(), line.description.clone()),
            ("quantity".to_string(), line.quantity.to_string()),
            ("unit_amount".to_string(), line.unit_amount.to_string()),
        ];
        self.post(key, "invoiceitems", &form).await
    }

    pub async fn finalize_invoice(&self, key: &str, id: &str) -> Result<StripeInvoice, AppError> {
        self.post(key, &format!("invoices/{id}/finalize"), &[]).await
    }

    pub async fn send_invoice(&self, key: &str, id: &str) -> Result<StripeInvoice, AppError> {
        self.post(key, &format!("invoices/{id}/send"), &[]).await
    }

    pub async fn void_invoice(&self, key: &str, id: &str) -> Result<StripeInvoice, AppError> {
        self.post(key, &format!("invoices/{id}/void"), &[]).await
    }

    /// Current state of a subscription on the platform account.
    pub async fn get_subscription(
        &self,
        key: &str,
        id: &str,
    ) -> Result<StripeSubscription, AppError> {
        self.call(reqwest::Method::GET, key, &format!("subscriptions/{id}"), &[])
            .await
    }
}

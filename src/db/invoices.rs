use crate::db::models::{Invoice, InvoiceDetail, InvoiceItem, UserId};
use crate::db::sqlite::Storage;
use crate::error::AppError;
use crate::types::{InvoiceStatus, PaymentProvider};
use chrono::{DateTime, NaiveDate, Utc};

/// Local mirror of an invoice created upstream.
#[derive(Debug, Clone)]
pub struct NewInvoice {
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
}

impl Storage {
    pub async fn insert_invoice(
        &self,
        user_id: UserId,
        inv: &NewInvoice,
        items: &[InvoiceItem],
    ) -> Result<InvoiceDetail, AppError> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        let id = sqlx::query(
            r#"INSERT INTO invoices (
                user_id, contact_id, watch_id, provider, provider_invoice_id, number, status,
                currency, total, due_date, hosted_url, memo, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user_id)
        .bind(inv.contact_id)
        .bind(inv.watch_id)
        .bind(inv.provider)
        .bind(&inv.provider_invoice_id)
        .bind(&inv.number)
        .bind(inv.status)
        .bind(&inv.currency)
        .bind(inv.total)
        .bind(inv.due_date)
        .bind(&inv.hosted_url)
        .bind(&inv.memo)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for item in items {
            sqlx::query(
                "INSERT INTO invoice_items (invoice_id, description, quantity, unit_price) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.get_invoice_detail(user_id, id)
            .await?
            .ok_or(AppError::NotFound("Invoice"))
    }

    pub async fn get_invoice(&self, user_id: UserId, id: i64) -> Result<Option<Invoice>, AppError> {
        let invoice =
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(invoice)
    }

    pub async fn get_invoice_detail(
        &self,
        user_id: UserId,
        id: i64,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let Some(invoice) = self.get_invoice(user_id, id).await? else {
            return Ok(None);
        };
        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT id, description, quantity, unit_price FROM invoice_items WHERE invoice_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        Ok(Some(InvoiceDetail { invoice, items }))
    }

    pub async fn list_invoices(&self, user_id: UserId) -> Result<Vec<Invoice>, AppError> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(invoices)
    }

    pub async fn find_invoice_by_provider_id(
        &self,
        provider: PaymentProvider,
        provider_invoice_id: &str,
    ) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE provider = ? AND provider_invoice_id = ?",
        )
        .bind(provider)
        .bind(provider_invoice_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(invoice)
    }

    /// Move an invoice to `next` unless the stored row sits in a terminal
    /// state. Returns the status the row ends up with.
    pub async fn apply_invoice_status(
        &self,
        invoice: &Invoice,
        next: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<InvoiceStatus, AppError> {
        if !invoice.status.can_become(next) {
            return Ok(invoice.status);
        }
        // `invoice` may be stale; the terminal check has to hold for the row itself.
        let res = sqlx::query(
            r#"UPDATE invoices SET status = ?, paid_at = COALESCE(paid_at, ?), updated_at = ?
               WHERE id = ? AND status NOT IN ('paid', 'void')"#,
        )
        .bind(next)
        .bind(paid_at)
        .bind(Utc::now())
        .bind(invoice.id)
        .execute(self.pool())
        .await?;
        if res.rows_affected() > 0 {
            return Ok(next);
        }
        let stored = sqlx::query_scalar::<_, InvoiceStatus>("SELECT status FROM invoices WHERE id = ?")
            .bind(invoice.id)
            .fetch_optional(self.pool())
            .await?
            .ok_or(AppError::NotFound("Invoice"))?;
        Ok(stored)
    }
}

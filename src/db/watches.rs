use crate::db::models::{UserId, Watch, WatchRecord};
use crate::db::sqlite::{Storage, contains_pattern};
use crate::error::AppError;
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleFilter {
    Sold,
    Unsold,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchFilter {
    pub status: Option<SaleFilter>,
    pub brand: Option<String>,
    /// Substring match on brand, model, reference or serial number.
    pub q: Option<String>,
}

/// Insert one watch on an existing connection so imports can share a transaction.
pub(crate) async fn insert_watch_row(
    conn: &mut SqliteConnection,
    user_id: UserId,
    rec: &WatchRecord,
) -> Result<i64, AppError> {
    let now = Utc::now();
    let id = sqlx::query(
        r#"INSERT INTO watches (
            user_id, brand, model, reference_number, serial_number, year, condition,
            accessories, date_purchased, purchased_from, purchase_price, seller_contact_id,
            date_sold, sold_platform, price_sold, buyer_contact_id, platform_fees,
            shipping_cost, taxes, accessories_cost, notes, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(user_id)
    .bind(&rec.brand)
    .bind(&rec.model)
    .bind(&rec.reference_number)
    .bind(&rec.serial_number)
    .bind(rec.year)
    .bind(&rec.condition)
    .bind(&rec.accessories)
    .bind(rec.date_purchased)
    .bind(&rec.purchased_from)
    .bind(rec.purchase_price)
    .bind(rec.seller_contact_id)
    .bind(rec.date_sold)
    .bind(&rec.sold_platform)
    .bind(rec.price_sold)
    .bind(rec.buyer_contact_id)
    .bind(rec.platform_fees)
    .bind(rec.shipping_cost)
    .bind(rec.taxes)
    .bind(rec.accessories_cost)
    .bind(&rec.notes)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

impl Storage {
    pub async fn insert_watch(&self, user_id: UserId, rec: &WatchRecord) -> Result<Watch, AppError> {
        let mut conn = self.pool().acquire().await?;
        let id = insert_watch_row(&mut *conn, user_id, rec).await?;
        drop(conn);
        self.get_watch(user_id, id).await?.ok_or(AppError::NotFound("Watch"))
    }

    /// Insert a batch of watches atomically. Returns the new ids in order.
    pub async fn insert_watches(
        &self,
        user_id: UserId,
        recs: &[WatchRecord],
    ) -> Result<Vec<i64>, AppError> {
        let mut tx = self.pool().begin().await?;
        let mut ids = Vec::with_capacity(recs.len());
        for rec in recs {
            ids.push(insert_watch_row(&mut *tx, user_id, rec).await?);
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn get_watch(&self, user_id: UserId, id: i64) -> Result<Option<Watch>, AppError> {
        let watch = sqlx::query_as::<_, Watch>("SELECT * FROM watches WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(watch)
    }

    pub async fn list_watches(
        &self,
        user_id: UserId,
        filter: &WatchFilter,
    ) -> Result<Vec<Watch>, AppError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM watches WHERE user_id = ");
        qb.push_bind(user_id);
        match filter.status {
            Some(SaleFilter::Sold) => {
                qb.push(" AND price_sold IS NOT NULL");
            }
            Some(SaleFilter::Unsold) => {
                qb.push(" AND price_sold IS NULL");
            }
            None => {}
        }
        if let Some(brand) = filter.brand.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            qb.push(" AND brand = ").push_bind(brand.to_string()).push(" COLLATE NOCASE");
        }
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = contains_pattern(q);
            qb.push(" AND (");
            let mut sep = qb.separated(" OR ");
            for col in ["brand", "model", "reference_number", "serial_number"] {
                sep.push(format!("{col} LIKE "));
                sep.push_bind_unseparated(pattern.clone());
                sep.push_unseparated(r" ESCAPE '\'");
            }
            qb.push(")");
        }
        qb.push(" ORDER BY COALESCE(date_purchased, created_at) DESC, id DESC");
        let watches = qb.build_query_as::<Watch>().fetch_all(self.pool()).await?;
        Ok(watches)
    }

    pub async fn update_watch(
        &self,
        user_id: UserId,
        id: i64,
        rec: &WatchRecord,
    ) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"UPDATE watches SET
                brand = ?, model = ?, reference_number = ?, serial_number = ?, year = ?,
                condition = ?, accessories = ?, date_purchased = ?, purchased_from = ?,
                purchase_price = ?, seller_contact_id = ?, date_sold = ?, sold_platform = ?,
                price_sold = ?, buyer_contact_id = ?, platform_fees = ?, shipping_cost = ?,
                taxes = ?, accessories_cost = ?, notes = ?, updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(&rec.brand)
        .bind(&rec.model)
        .bind(&rec.reference_number)
        .bind(&rec.serial_number)
        .bind(rec.year)
        .bind(&rec.condition)
        .bind(&rec.accessories)
        .bind(rec.date_purchased)
        .bind(&rec.purchased_from)
        .bind(rec.purchase_price)
        .bind(rec.seller_contact_id)
        .bind(rec.date_sold)
        .bind(&rec.sold_platform)
        .bind(rec.price_sold)
        .bind(rec.buyer_contact_id)
        .bind(rec.platform_fees)
        .bind(rec.shipping_cost)
        .bind(rec.taxes)
        .bind(rec.accessories_cost)
        .bind(&rec.notes)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete_watch(&self, user_id: UserId, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM watches WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn count_unsold_watches(&self, user_id: UserId) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM watches WHERE user_id = ? AND price_sold IS NULL")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;
        Ok(count)
    }

    /// Watches the contact bought or sold.
    pub async fn watches_for_contact(
        &self,
        user_id: UserId,
        contact_id: i64,
    ) -> Result<Vec<Watch>, AppError> {
        let watches = sqlx::query_as::<_, Watch>(
            r#"SELECT * FROM watches
               WHERE user_id = ? AND (buyer_contact_id = ? OR seller_contact_id = ?)
               ORDER BY id DESC"#,
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(contact_id)
        .fetch_all(self.pool())
        .await?;
        Ok(watches)
    }
}

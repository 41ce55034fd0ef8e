use crate::db::models::{Lead, LeadRecord, UserId};
use crate::db::sqlite::Storage;
use crate::error::AppError;
use crate::types::LeadStatus;
use chrono::{NaiveDate, Utc};

impl Storage {
    pub async fn insert_lead(&self, user_id: UserId, rec: &LeadRecord) -> Result<Lead, AppError> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"INSERT INTO leads (
                user_id, title, status, contact_id, watch_id, reminder_date, notes,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user_id)
        .bind(&rec.title)
        .bind(rec.status)
        .bind(rec.contact_id)
        .bind(rec.watch_id)
        .bind(rec.reminder_date)
        .bind(&rec.notes)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();
        self.get_lead(user_id, id).await?.ok_or(AppError::NotFound("Lead"))
    }

    pub async fn get_lead(&self, user_id: UserId, id: i64) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(lead)
    }

    pub async fn list_leads(
        &self,
        user_id: UserId,
        status: Option<LeadStatus>,
    ) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"SELECT * FROM leads
               WHERE user_id = ? AND (? IS NULL OR status = ?)
               ORDER BY reminder_date IS NULL, reminder_date, id DESC"#,
        )
        .bind(user_id)
        .bind(status)
        .bind(status)
        .fetch_all(self.pool())
        .await?;
        Ok(leads)
    }

    /// Open leads whose reminder falls on or before `until`.
    pub async fn due_lead_reminders(
        &self,
        user_id: UserId,
        until: NaiveDate,
    ) -> Result<Vec<Lead>, AppError> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"SELECT * FROM leads
               WHERE user_id = ?
                 AND reminder_date IS NOT NULL AND reminder_date <= ?
                 AND status IN ('new', 'contacted', 'negotiating')
               ORDER BY reminder_date, id"#,
        )
        .bind(user_id)
        .bind(until)
        .fetch_all(self.pool())
        .await?;
        Ok(leads)
    }

    pub async fn update_lead(
        &self,
        user_id: UserId,
        id: i64,
        rec: &LeadRecord,
    ) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"UPDATE leads SET
                title = ?, status = ?, contact_id = ?, watch_id = ?, reminder_date = ?,
                notes = ?, updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(&rec.title)
        .bind(rec.status)
        .bind(rec.contact_id)
        .bind(rec.watch_id)
        .bind(rec.reminder_date)
        .bind(&rec.notes)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Returns `false` when the lead already had `status`; nothing is written then.
    pub async fn set_lead_status(
        &self,
        user_id: UserId,
        id: i64,
        status: LeadStatus,
    ) -> Result<bool, AppError> {
        let res = sqlx::query(
            "UPDATE leads SET status = ?, updated_at = ? WHERE id = ? AND user_id = ? AND status <> ?",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .bind(status)
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete_lead(&self, user_id: UserId, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM leads WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn watch_exists(&self, user_id: UserId, id: i64) -> Result<bool, AppError> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM watches WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(found.is_some())
    }
}

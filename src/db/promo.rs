use crate::db::models::{PromoSignup, PromoSignupInput, UserId};
use crate::db::sqlite::Storage;
use crate::error::AppError;
use crate::types::PromoStatus;
use chrono::Utc;

impl Storage {
    pub async fn insert_promo_signup(
        &self,
        input: &PromoSignupInput,
    ) -> Result<PromoSignup, AppError> {
        let id = sqlx::query(
            r#"INSERT INTO promo_signups (
                campaign, first_name, last_name, email, phone, message, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)"#,
        )
        .bind(&input.campaign)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.message)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Already signed up for this campaign"))?
        .last_insert_rowid();
        self.get_promo_signup(id)
            .await?
            .ok_or(AppError::NotFound("Signup"))
    }

    pub async fn get_promo_signup(&self, id: i64) -> Result<Option<PromoSignup>, AppError> {
        let signup = sqlx::query_as::<_, PromoSignup>("SELECT * FROM promo_signups WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(signup)
    }

    pub async fn list_promo_signups(
        &self,
        status: Option<PromoStatus>,
    ) -> Result<Vec<PromoSignup>, AppError> {
        let signups = sqlx::query_as::<_, PromoSignup>(
            r#"SELECT * FROM promo_signups WHERE (? IS NULL OR status = ?)
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(status)
        .bind(status)
        .fetch_all(self.pool())
        .await?;
        Ok(signups)
    }

    pub async fn review_promo_signup(
        &self,
        id: i64,
        status: PromoStatus,
        user_id: Option<UserId>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE promo_signups SET status = ?, user_id = COALESCE(?, user_id), reviewed_at = ?
               WHERE id = ?"#,
        )
        .bind(status)
        .bind(user_id)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

use crate::db::models::{Card, CardInput, UserId};
use crate::db::sqlite::Storage;
use crate::error::AppError;
use chrono::Utc;

impl Storage {
    pub async fn insert_card(
        &self,
        user_id: UserId,
        contact_id: i64,
        card: &CardInput,
    ) -> Result<Card, AppError> {
        let id = sqlx::query(
            r#"INSERT INTO cards (
                user_id, contact_id, brand, last4, exp_month, exp_year, cardholder_name,
                provider_token, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(&card.brand)
        .bind(&card.last4)
        .bind(card.exp_month)
        .bind(card.exp_year)
        .bind(&card.cardholder_name)
        .bind(&card.provider_token)
        .bind(Utc::now())
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await?;
        Ok(card)
    }

    pub async fn list_cards(&self, user_id: UserId, contact_id: i64) -> Result<Vec<Card>, AppError> {
        let cards = sqlx::query_as::<_, Card>(
            "SELECT * FROM cards WHERE user_id = ? AND contact_id = ? ORDER BY id",
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_all(self.pool())
        .await?;
        Ok(cards)
    }

    pub async fn delete_card(
        &self,
        user_id: UserId,
        contact_id: i64,
        card_id: i64,
    ) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM cards WHERE id = ? AND contact_id = ? AND user_id = ?")
            .bind(card_id)
            .bind(contact_id)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

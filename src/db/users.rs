use crate::db::models::{User, UserId};
use crate::db::sqlite::Storage;
use crate::error::AppError;
use crate::types::{SubscriptionStatus, Tier, UserStatus};
use chrono::{NaiveDate, Utc};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: UserStatus,
}

/// Subscription mirror fields, written by admins and Stripe webhooks.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionUpdate {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub price: Option<f64>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

fn user_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        let msg = if db.message().contains("users.email") {
            "Email is already registered"
        } else {
            "Username is already taken"
        };
        return AppError::Conflict(msg.to_string());
    }
    AppError::Database(e)
}

impl Storage {
    pub async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"INSERT INTO users (
                username, email, password_hash, first_name, last_name, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.status)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(user_conflict)?
        .last_insert_rowid();
        self.get_user(id).await?.ok_or(AppError::NotFound("User"))
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    /// Look a user up by username or email; both compare case-insensitively.
    pub async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? OR email = ?")
                .bind(login)
                .bind(login)
                .fetch_optional(self.pool())
                .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_stripe_ids(
        &self,
        subscription_id: &str,
        customer_id: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT * FROM users
               WHERE stripe_subscription_id = ?
                  OR (? IS NOT NULL AND stripe_customer_id = ?)
               ORDER BY id LIMIT 1"#,
        )
        .bind(subscription_id)
        .bind(customer_id)
        .bind(customer_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        Ok(users)
    }

    pub async fn set_user_status(&self, id: UserId, status: UserStatus) -> Result<bool, AppError> {
        let res = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_user_admin(&self, id: UserId, is_admin: bool) -> Result<bool, AppError> {
        let res = sqlx::query("UPDATE users SET is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(is_admin)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn update_user_profile(
        &self,
        id: UserId,
        first_name: Option<String>,
        last_name: Option<String>,
        email: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, email = ?, updated_at = ? WHERE id = ?",
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(user_conflict)?;
        Ok(())
    }

    pub async fn set_stripe_keys(
        &self,
        id: UserId,
        publishable_key: Option<&str>,
        secret_key: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE users SET stripe_publishable_key = ?, stripe_secret_key = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(publishable_key)
        .bind(secret_key)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn set_square_credentials(
        &self,
        id: UserId,
        access_token: Option<&str>,
        location_id: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE users SET square_access_token = ?, square_location_id = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(access_token)
        .bind(location_id)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_subscription(
        &self,
        id: UserId,
        update: &SubscriptionUpdate,
    ) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"UPDATE users SET
                subscription_tier = ?,
                subscription_status = ?,
                subscription_price = ?,
                subscription_start = COALESCE(?, subscription_start),
                subscription_end = ?,
                stripe_customer_id = COALESCE(?, stripe_customer_id),
                stripe_subscription_id = COALESCE(?, stripe_subscription_id),
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(update.tier)
        .bind(update.status)
        .bind(update.price)
        .bind(update.start)
        .bind(update.end)
        .bind(update.stripe_customer_id.as_deref())
        .bind(update.stripe_subscription_id.as_deref())
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete_user(&self, id: UserId) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

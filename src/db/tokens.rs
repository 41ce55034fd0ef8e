use crate::db::models::{UserId, UserToken};
use crate::db::sqlite::Storage;
use crate::error::AppError;
use crate::types::TokenKind;
use chrono::Utc;

impl Storage {
    /// Store a freshly minted token hash, replacing unused tokens of the same kind.
    pub async fn store_token(
        &self,
        user_id: UserId,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM user_tokens WHERE user_id = ? AND kind = ? AND used_at IS NULL")
            .bind(user_id)
            .bind(kind)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"INSERT INTO user_tokens (user_id, kind, token_hash, expires_at, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(token_hash)
        .bind(now + kind.ttl())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Mark a token used and return its owner. Unknown, expired and already
    /// used tokens all yield `None`.
    pub async fn consume_token(
        &self,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<UserId>, AppError> {
        let token = sqlx::query_as::<_, UserToken>(
            r#"SELECT id, user_id, kind, expires_at, used_at FROM user_tokens
               WHERE token_hash = ? AND kind = ?"#,
        )
        .bind(token_hash)
        .bind(kind)
        .fetch_optional(self.pool())
        .await?;

        let now = Utc::now();
        let Some(token) = token else {
            return Ok(None);
        };
        if token.used_at.is_some() || token.expires_at <= now {
            return Ok(None);
        }

        let res = sqlx::query("UPDATE user_tokens SET used_at = ? WHERE id = ? AND used_at IS NULL")
            .bind(now)
            .bind(token.id)
            .execute(self.pool())
            .await?;
        // A concurrent request consumed it first.
        if res.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(token.user_id))
    }

    /// Owner of a token that was already used, for idempotent re-verification.
    pub async fn used_token_owner(
        &self,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<UserId>, AppError> {
        let owner: Option<(UserId,)> = sqlx::query_as(
            "SELECT user_id FROM user_tokens WHERE token_hash = ? AND kind = ? AND used_at IS NOT NULL",
        )
        .bind(token_hash)
        .bind(kind)
        .fetch_optional(self.pool())
        .await?;
        Ok(owner.map(|o| o.0))
    }
}

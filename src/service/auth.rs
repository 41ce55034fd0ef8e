//! Password hashing, JWT issuance/verification and one-time mail tokens.

use crate::db::models::{User, UserId};
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const MAIL_TOKEN_LEN: usize = 40;

/// bcrypt is CPU bound; run it off the async workers.
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(ok)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    #[serde(default)]
    pub admin: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            admin: user.is_admin,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding,
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(data.claims)
    }

    /// Decode without checking expiry, for auditing old tokens.
    pub fn inspect(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Random token for verification, reset and invite links.
pub fn generate_mail_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MAIL_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Only the SHA-256 of a mail token is stored.
pub fn hash_mail_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.trim().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SubscriptionStatus, Tier, UserStatus};

    fn user() -> User {
        User {
            id: 7,
            username: "dealer".into(),
            email: "dealer@example.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            status: UserStatus::Active,
            is_admin: true,
            subscription_tier: Tier::Free,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_price: None,
            subscription_start: None,
            subscription_end: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_publishable_key: None,
            stripe_secret_key: None,
            square_access_token: None,
            square_location_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn jwt_round_trip_keeps_identity() {
        let keys = JwtKeys::new("secret", 1);
        let token = keys.issue(&user()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert!(claims.admin);
    }

    #[test]
    fn jwt_from_other_secret_is_rejected() {
        let token = JwtKeys::new("one", 1).issue(&user()).unwrap();
        assert!(JwtKeys::new("two", 1).verify(&token).is_err());
    }

    #[test]
    fn expired_jwt_fails_verify_but_can_be_inspected() {
        let keys = JwtKeys::new("secret", -2);
        let token = keys.issue(&user()).unwrap();
        assert!(keys.verify(&token).is_err());
        assert_eq!(keys.inspect(&token).unwrap().username, "dealer");
    }

    #[test]
    fn mail_tokens_are_random_and_hashed() {
        let a = generate_mail_token();
        let b = generate_mail_token();
        assert_eq!(a.len(), MAIL_TOKEN_LEN);
        assert_ne!(a, b);
        assert_eq!(hash_mail_token(&a).len(), 64);
        assert_eq!(hash_mail_token(&a), hash_mail_token(&format!(" {a} ")));
    }

    #[tokio::test]
    async fn bcrypt_verifies_only_the_right_password() {
        let hash = hash_password("correct horse", 4).await.unwrap();
        assert!(verify_password("correct horse", &hash).await.unwrap());
        assert!(!verify_password("wrong horse", &hash).await.unwrap());
    }
}

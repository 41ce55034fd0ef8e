use crate::db::models::UserProfile;
use crate::error::AppError;
use crate::handlers::{Message, message};
use crate::middleware::{ApiJson, AuthUser};
use crate::router::AppState;
use crate::service::auth::{hash_password, verify_password};
use crate::service::tiers::{self, SubscriptionSummary};
use crate::service::validation::{check_password, clean, normalize_email};
use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeKeysRequest {
    #[serde(default)]
    pub publishable_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SquareCredentialsRequest {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

async fn reload(state: &AppState, id: i64) -> Result<UserProfile, AppError> {
    let user = state
        .storage
        .get_user(id)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(user.profile())
}

async fn confirm_password(password: &str, hash: &str) -> Result<(), AppError> {
    if verify_password(password, hash).await? {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Password is incorrect"))
    }
}

pub async fn get_account(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user.profile())
}

pub async fn update_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let email = normalize_email(&req.email)?;
    state
        .storage
        .update_user_profile(user.id, clean(req.first_name), clean(req.last_name), &email)
        .await?;
    Ok(Json(reload(&state, user.id).await?))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<Message>, AppError> {
    confirm_password(&req.current_password, &user.password_hash).await?;
    check_password(&req.new_password)?;
    let hash = hash_password(&req.new_password, state.config.bcrypt_cost).await?;
    state.storage.set_password_hash(user.id, &hash).await?;
    info!(user_id = user.id, "password changed");
    Ok(message("Password updated"))
}

fn check_key_prefix(
    field: &str,
    key: Option<&str>,
    prefixes: &[&str],
) -> Result<(), AppError> {
    match key {
        Some(k) if !prefixes.iter().any(|p| k.starts_with(p)) => Err(AppError::validation(
            format!("{field} must start with {}", prefixes.join(" or ")),
        )),
        _ => Ok(()),
    }
}

pub async fn set_stripe_keys(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<StripeKeysRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let publishable = clean(req.publishable_key);
    let secret = clean(req.secret_key);
    check_key_prefix("publishable_key", publishable.as_deref(), &["pk_"])?;
    check_key_prefix("secret_key", secret.as_deref(), &["sk_", "rk_"])?;
    state
        .storage
        .set_stripe_keys(user.id, publishable.as_deref(), secret.as_deref())
        .await?;
    info!(user_id = user.id, has_secret = secret.is_some(), "stripe keys updated");
    Ok(Json(reload(&state, user.id).await?))
}

pub async fn set_square_credentials(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<SquareCredentialsRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let token = clean(req.access_token);
    let location = clean(req.location_id);
    if token.is_some() != location.is_some() {
        return Err(AppError::validation(
            "access_token and location_id must be set together",
        ));
    }
    state
        .storage
        .set_square_credentials(user.id, token.as_deref(), location.as_deref())
        .await?;
    info!(user_id = user.id, "square credentials updated");
    Ok(Json(reload(&state, user.id).await?))
}

pub async fn subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SubscriptionSummary>, AppError> {
    let active = state.storage.count_unsold_watches(user.id).await?;
    Ok(Json(tiers::summarize(&user, active)))
}

pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<DeleteAccountRequest>,
) -> Result<Json<Message>, AppError> {
    confirm_password(&req.password, &user.password_hash).await?;
    state.storage.delete_user(user.id).await?;
    info!(user_id = user.id, "account deleted");
    Ok(message("Account deleted"))
}

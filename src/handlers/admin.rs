use crate::db::models::{PromoSignup, User, UserProfile};
use crate::db::users::{NewUser, SubscriptionUpdate};
use crate::error::AppError;
use crate::handlers::{Message, message, send_token_mail};
use crate::middleware::{AdminUser, ApiJson, ApiQuery};
use crate::router::AppState;
use crate::service::auth::{generate_mail_token, hash_password};
use crate::service::validation::parse_optional_date;
use crate::types::{PromoStatus, SubscriptionStatus, Tier, TokenKind, UserStatus};
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

const USERNAME_MAX: usize = 32;

#[derive(Debug, Default, Deserialize)]
pub struct PromoFilter {
    pub status: Option<PromoStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub tier: Tier,
    #[serde(default)]
    pub status: Option<SubscriptionStatus>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub end: Option<String>,
}

async fn load_user(state: &AppState, id: i64) -> Result<User, AppError> {
    state
        .storage
        .get_user(id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

async fn load_signup(state: &AppState, id: i64) -> Result<PromoSignup, AppError> {
    state
        .storage
        .get_promo_signup(id)
        .await?
        .ok_or(AppError::NotFound("Signup"))
}

/// Username seed from an email's local part, e.g. `jane.doe+x@...` -> `jane.doe`.
fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .take_while(|c| *c != '+')
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(USERNAME_MAX - 4)
        .collect();
    while base.len() < 3 {
        base.push('_');
    }
    base
}

async fn free_username(state: &AppState, email: &str) -> Result<String, AppError> {
    let base = username_base(email);
    if state.storage.find_user_by_login(&base).await?.is_none() {
        return Ok(base);
    }
    for n in 2..10_000 {
        let candidate = format!("{base}{n}");
        if state.storage.find_user_by_login(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict("Could not pick a free username".to_string()))
}

pub async fn list_promo(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    ApiQuery(filter): ApiQuery<PromoFilter>,
) -> Result<Json<Vec<PromoSignup>>, AppError> {
    Ok(Json(state.storage.list_promo_signups(filter.status).await?))
}

/// Create (or link) the applicant's account and invite them. Approving an
/// approved signup changes nothing.
pub async fn approve_promo(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<PromoSignup>, AppError> {
    let signup = load_signup(&state, id).await?;
    if signup.status == PromoStatus::Approved {
        return Ok(Json(signup));
    }

    let user = match state.storage.find_user_by_email(&signup.email).await? {
        Some(existing) => existing,
        None => {
            // Unusable until the invite sets a real password.
            let placeholder = hash_password(&generate_mail_token(), state.config.bcrypt_cost).await?;
            state
                .storage
                .create_user(NewUser {
                    username: free_username(&state, &signup.email).await?,
                    email: signup.email.clone(),
                    password_hash: placeholder,
                    first_name: Some(signup.first_name.clone()),
                    last_name: Some(signup.last_name.clone()),
                    status: UserStatus::Invited,
                })
                .await?
        }
    };
    if user.status == UserStatus::Invited {
        send_token_mail(&state, &user, TokenKind::Invite).await?;
    }
    state
        .storage
        .review_promo_signup(id, PromoStatus::Approved, Some(user.id))
        .await?;
    info!(signup_id = id, user_id = user.id, admin_id = admin.id, "promo signup approved");
    Ok(Json(load_signup(&state, id).await?))
}

pub async fn reject_promo(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<PromoSignup>, AppError> {
    let signup = load_signup(&state, id).await?;
    match signup.status {
        PromoStatus::Rejected => return Ok(Json(signup)),
        PromoStatus::Approved => {
            return Err(AppError::Conflict("Signup was already approved".to_string()));
        }
        PromoStatus::Pending => {}
    }
    state
        .storage
        .review_promo_signup(id, PromoStatus::Rejected, None)
        .await?;
    info!(signup_id = id, admin_id = admin.id, "promo signup rejected");
    Ok(Json(load_signup(&state, id).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state.storage.list_users().await?;
    Ok(Json(users.iter().map(User::profile).collect()))
}

pub async fn set_user_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<UserProfile>, AppError> {
    if id == admin.id && req.status != UserStatus::Active {
        return Err(AppError::Forbidden(
            "Admins cannot suspend their own account".to_string(),
        ));
    }
    if !state.storage.set_user_status(id, req.status).await? {
        return Err(AppError::NotFound("User"));
    }
    info!(user_id = id, status = ?req.status, admin_id = admin.id, "user status changed");
    Ok(Json(load_user(&state, id).await?.profile()))
}

pub async fn set_user_subscription(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<SubscriptionRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let user = load_user(&state, id).await?;
    if let Some(price) = req.price
        && (!price.is_finite() || price < 0.0)
    {
        return Err(AppError::validation("price must be a non-negative amount"));
    }
    let update = SubscriptionUpdate {
        tier: req.tier,
        status: req.status.unwrap_or(SubscriptionStatus::Active),
        price: Some(req.price.unwrap_or_else(|| req.tier.default_monthly_price())),
        start: match user.subscription_start {
            Some(_) => None,
            None => Some(Utc::now().date_naive()),
        },
        end: parse_optional_date("end", req.end.as_deref())?,
        stripe_customer_id: None,
        stripe_subscription_id: None,
    };
    state.storage.update_subscription(id, &update).await?;
    info!(user_id = id, tier = ?update.tier, status = ?update.status, admin_id = admin.id, "subscription set by admin");
    Ok(Json(load_user(&state, id).await?.profile()))
}

pub async fn send_password_reset(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Message>, AppError> {
    let user = load_user(&state, id).await?;
    send_token_mail(&state, &user, TokenKind::Reset).await?;
    info!(user_id = id, admin_id = admin.id, "password reset sent by admin");
    Ok(message("Password reset email sent"))
}

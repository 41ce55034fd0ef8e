use crate::db::models::{User, UserProfile};
use crate::db::users::NewUser;
use crate::error::AppError;
use crate::handlers::{Message, message, send_token_mail};
use crate::middleware::auth::ensure_active;
use crate::middleware::{ApiJson, AuthUser};
use crate::router::AppState;
use crate::service::auth::{hash_mail_token, hash_password, verify_password};
use crate::service::validation::{check_password, check_username, clean, normalize_email};
use crate::types::{TokenKind, UserStatus};
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub message: &'static str,
    pub user: UserProfile,
}

fn session(state: &AppState, user: &User) -> Result<Json<Session>, AppError> {
    Ok(Json(Session {
        token: state.jwt.issue(user)?,
        user: user.profile(),
    }))
}

async fn load_user(state: &AppState, id: i64) -> Result<User, AppError> {
    state
        .storage
        .get_user(id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let username = check_username(&req.username)?;
    let email = normalize_email(&req.email)?;
    check_password(&req.password)?;
    let password_hash = hash_password(&req.password, state.config.bcrypt_cost).await?;

    let user = state
        .storage
        .create_user(NewUser {
            username,
            email,
            password_hash,
            first_name: clean(req.first_name),
            last_name: clean(req.last_name),
            status: UserStatus::Pending,
        })
        .await?;
    info!(user_id = user.id, username = %user.username, "user registered");
    send_token_mail(&state, &user, TokenKind::Verify).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope {
            message: "Check your email to verify your account",
            user: user.profile(),
        }),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TokenRequest>,
) -> Result<Json<UserEnvelope>, AppError> {
    let hash = hash_mail_token(&req.token);
    if let Some(user_id) = state.storage.consume_token(TokenKind::Verify, &hash).await? {
        let user = load_user(&state, user_id).await?;
        if user.status == UserStatus::Pending {
            state.storage.set_user_status(user.id, UserStatus::Active).await?;
            info!(user_id, "email verified");
        }
        let user = load_user(&state, user_id).await?;
        return Ok(Json(UserEnvelope {
            message: "Email verified",
            user: user.profile(),
        }));
    }

    // A second click on the same link succeeds once the account is active.
    if let Some(user_id) = state.storage.used_token_owner(TokenKind::Verify, &hash).await? {
        let user = load_user(&state, user_id).await?;
        if user.status == UserStatus::Active {
            return Ok(Json(UserEnvelope {
                message: "Email already verified",
                user: user.profile(),
            }));
        }
    }
    Err(AppError::validation("Invalid or expired verification link"))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let login = req.login.trim();
    state.throttle.check("login", login)?;

    let Some(user) = state.storage.find_user_by_login(login).await? else {
        return Err(AppError::Unauthorized("Invalid credentials"));
    };
    if !verify_password(&req.password, &user.password_hash).await? {
        return Err(AppError::Unauthorized("Invalid credentials"));
    }
    ensure_active(&user)?;
    info!(user_id = user.id, "login");
    session(&state, &user)
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Message>, AppError> {
    let email = req.email.trim().to_ascii_lowercase();
    state.throttle.check("forgot", &email)?;
    if let Some(user) = state.storage.find_user_by_email(&email).await?
        && user.status != UserStatus::Suspended
    {
        send_token_mail(&state, &user, TokenKind::Reset).await?;
    }
    Ok(message("If that email is registered, a reset link is on its way"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TokenPasswordRequest>,
) -> Result<Json<Message>, AppError> {
    check_password(&req.password)?;
    let hash = hash_mail_token(&req.token);
    let user_id = state
        .storage
        .consume_token(TokenKind::Reset, &hash)
        .await?
        .ok_or_else(|| AppError::validation("Invalid or expired reset link"))?;
    let user = load_user(&state, user_id).await?;

    let password_hash = hash_password(&req.password, state.config.bcrypt_cost).await?;
    state.storage.set_password_hash(user.id, &password_hash).await?;
    // The reset link proves the address.
    if user.status == UserStatus::Pending {
        state.storage.set_user_status(user.id, UserStatus::Active).await?;
    }
    info!(user_id, "password reset");
    Ok(message("Password updated"))
}

pub async fn accept_invite(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TokenPasswordRequest>,
) -> Result<Json<Session>, AppError> {
    check_password(&req.password)?;
    let hash = hash_mail_token(&req.token);
    let user_id = state
        .storage
        .consume_token(TokenKind::Invite, &hash)
        .await?
        .ok_or_else(|| AppError::validation("Invalid or expired invitation"))?;
    let user = load_user(&state, user_id).await?;
    if user.status == UserStatus::Suspended {
        return Err(AppError::Forbidden("Account suspended".to_string()));
    }

    let password_hash = hash_password(&req.password, state.config.bcrypt_cost).await?;
    state.storage.set_password_hash(user.id, &password_hash).await?;
    if user.status != UserStatus::Active {
        state.storage.set_user_status(user.id, UserStatus::Active).await?;
    }
    info!(user_id, "invitation accepted");
    let user = load_user(&state, user_id).await?;
    session(&state, &user)
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user.profile())
}

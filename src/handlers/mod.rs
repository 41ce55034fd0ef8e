pub mod account;
pub mod admin;
pub mod auth;
pub mod contacts;
pub mod invoices;
pub mod leads;
pub mod promo;
pub mod watches;
pub mod webhooks;

use crate::db::models::User;
use crate::error::AppError;
use crate::router::AppState;
use crate::service::auth::{generate_mail_token, hash_mail_token};
use crate::service::email::{self, OutgoingEmail};
use crate::types::TokenKind;
use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

pub(crate) fn message(message: &'static str) -> Json<Message> {
    Json(Message { message })
}

/// Store a fresh one-time token for `user` and mail its link best-effort.
/// Only a failure to store the token fails the request.
pub(crate) async fn send_token_mail(
    state: &AppState,
    user: &User,
    kind: TokenKind,
) -> Result<(), AppError> {
    let token = generate_mail_token();
    state
        .storage
        .store_token(user.id, kind, &hash_mail_token(&token))
        .await?;
    let name = user.first_name.as_deref();
    let mail: OutgoingEmail = match kind {
        TokenKind::Verify => {
            let link = state.config.app_link("/verify-email", &token);
            email::verification_email(&user.email, name, &link)
        }
        TokenKind::Reset => {
            let link = state.config.app_link("/reset-password", &token);
            email::password_reset_email(&user.email, name, &link)
        }
        TokenKind::Invite => {
            let link = state.config.app_link("/accept-invite", &token);
            email::invitation_email(&user.email, name, &link)
        }
    };
    state.mailer.send_best_effort(mail).await;
    Ok(())
}

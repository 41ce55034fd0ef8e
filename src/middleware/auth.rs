use crate::db::models::User;
use crate::error::AppError;
use crate::router::AppState;
use crate::types::UserStatus;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

/// Active user behind the request's `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Login is refused for every status but `active`.
pub fn ensure_active(user: &User) -> Result<(), AppError> {
    match user.status {
        UserStatus::Active => Ok(()),
        UserStatus::Pending => Err(AppError::Forbidden("Email not verified".to_string())),
        UserStatus::Suspended => Err(AppError::Forbidden("Account suspended".to_string())),
        UserStatus::Invited => Err(AppError::Forbidden("Invitation not accepted".to_string())),
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("Missing bearer token"))?;
        let claims = state
            .jwt
            .verify(bearer.token())
            .map_err(|_| AppError::Unauthorized("Invalid or expired token"))?;
        let user = state
            .storage
            .get_user(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized("Account no longer exists"))?;
        ensure_active(&user)?;
        Ok(Self(user))
    }
}

/// [`AuthUser`] that also has `is_admin`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

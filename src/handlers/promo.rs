use crate::db::models::{PromoSignup, PromoSignupInput};
use crate::error::AppError;
use crate::middleware::ApiJson;
use crate::router::AppState;
use crate::service::email;
use crate::service::validation::{clean, normalize_email};
use axum::{Json, extract::State, http::StatusCode};
use tracing::info;

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Public signup; an admin approves it later.
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PromoSignupInput>,
) -> Result<(StatusCode, Json<PromoSignup>), AppError> {
    let input = PromoSignupInput {
        campaign: required("campaign", &input.campaign)?,
        first_name: required("first_name", &input.first_name)?,
        last_name: required("last_name", &input.last_name)?,
        email: normalize_email(&input.email)?,
        phone: clean(input.phone),
        message: clean(input.message),
    };
    state.throttle.check("promo", &input.email)?;

    let signup = state.storage.insert_promo_signup(&input).await?;
    info!(signup_id = signup.id, campaign = %signup.campaign, "promo signup");

    state
        .mailer
        .send_best_effort(email::promo_confirmation_email(
            &signup.email,
            &signup.first_name,
            &signup.campaign,
        ))
        .await;
    if let Some(admin) = state.config.admin_email.as_deref() {
        let applicant = format!("{} {}", signup.first_name, signup.last_name);
        state
            .mailer
            .send_best_effort(email::promo_admin_notice(
                admin,
                &signup.campaign,
                &applicant,
                &signup.email,
                signup.message.as_deref(),
            ))
            .await;
    }
    Ok((StatusCode::CREATED, Json(signup)))
}

use crate::db::models::{Lead, LeadInput, LeadRecord, User};
use crate::error::AppError;
use crate::handlers::{Message, message};
use crate::middleware::{ApiJson, ApiQuery, AuthUser};
use crate::router::AppState;
use crate::service::validation::{parse_optional_date, validate_lead};
use crate::types::LeadStatus;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReminderQuery {
    pub until: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: LeadStatus,
}

async fn check_refs(state: &AppState, user: &User, rec: &LeadRecord) -> Result<(), AppError> {
    if let Some(id) = rec.contact_id
        && !state.storage.contact_exists(user.id, id).await?
    {
        return Err(AppError::validation("contact_id does not match one of your contacts"));
    }
    if let Some(id) = rec.watch_id
        && !state.storage.watch_exists(user.id, id).await?
    {
        return Err(AppError::validation("watch_id does not match one of your watches"));
    }
    Ok(())
}

async fn owned_lead(state: &AppState, user: &User, id: i64) -> Result<Lead, AppError> {
    state
        .storage
        .get_lead(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Lead"))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(filter): ApiQuery<LeadFilter>,
) -> Result<Json<Vec<Lead>>, AppError> {
    Ok(Json(state.storage.list_leads(user.id, filter.status).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Lead>, AppError> {
    Ok(Json(owned_lead(&state, &user, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(input): ApiJson<LeadInput>,
) -> Result<(StatusCode, Json<Lead>), AppError> {
    let rec = validate_lead(input)?;
    check_refs(&state, &user, &rec).await?;
    let lead = state.storage.insert_lead(user.id, &rec).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<LeadInput>,
) -> Result<Json<Lead>, AppError> {
    let rec = validate_lead(input)?;
    check_refs(&state, &user, &rec).await?;
    if !state.storage.update_lead(user.id, id, &rec).await? {
        return Err(AppError::NotFound("Lead"));
    }
    Ok(Json(owned_lead(&state, &user, id).await?))
}

/// Setting the status a lead already has is a successful no-op.
pub async fn set_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> Result<Json<Lead>, AppError> {
    owned_lead(&state, &user, id).await?;
    state.storage.set_lead_status(user.id, id, req.status).await?;
    Ok(Json(owned_lead(&state, &user, id).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Message>, AppError> {
    if !state.storage.delete_lead(user.id, id).await? {
        return Err(AppError::NotFound("Lead"));
    }
    Ok(message("Lead deleted"))
}

pub async fn reminders(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(query): ApiQuery<ReminderQuery>,
) -> Result<Json<Vec<Lead>>, AppError> {
    let until = parse_optional_date("until", query.until.as_deref())?
        .unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(state.storage.due_lead_reminders(user.id, until).await?))
}

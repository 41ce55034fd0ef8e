use crate::db::contacts::ContactFilter;
use crate::db::models::{Card, CardInput, Contact, ContactInput, User, WatchView};
use crate::error::AppError;
use crate::handlers::{Message, message};
use crate::middleware::{ApiJson, ApiQuery, AuthUser};
use crate::router::AppState;
use crate::service::import::{self, ImportReport, ImportRequest};
use crate::service::validation::{validate_card, validate_contact};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

async fn owned_contact(state: &AppState, user: &User, id: i64) -> Result<Contact, AppError> {
    state
        .storage
        .get_contact(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Contact"))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(filter): ApiQuery<ContactFilter>,
) -> Result<Json<Vec<Contact>>, AppError> {
    Ok(Json(state.storage.list_contacts(user.id, &filter).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, AppError> {
    Ok(Json(owned_contact(&state, &user, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(input): ApiJson<ContactInput>,
) -> Result<(StatusCode, Json<Contact>), AppError> {
    let input = validate_contact(input)?;
    let contact = state.storage.insert_contact(user.id, &input).await?;
    info!(user_id = user.id, contact_id = contact.id, "contact created");
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<ContactInput>,
) -> Result<Json<Contact>, AppError> {
    let input = validate_contact(input)?;
    if !state.storage.update_contact(user.id, id, &input).await? {
        return Err(AppError::NotFound("Contact"));
    }
    Ok(Json(owned_contact(&state, &user, id).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Message>, AppError> {
    if !state.storage.delete_contact(user.id, id).await? {
        return Err(AppError::NotFound("Contact"));
    }
    info!(user_id = user.id, contact_id = id, "contact deleted");
    Ok(message("Contact deleted"))
}

pub async fn watches(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<WatchView>>, AppError> {
    owned_contact(&state, &user, id).await?;
    let watches = state.storage.watches_for_contact(user.id, id).await?;
    Ok(Json(watches.into_iter().map(|w| w.view()).collect()))
}

pub async fn list_cards(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Card>>, AppError> {
    owned_contact(&state, &user, id).await?;
    Ok(Json(state.storage.list_cards(user.id, id).await?))
}

pub async fn add_card(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<CardInput>,
) -> Result<(StatusCode, Json<Card>), AppError> {
    owned_contact(&state, &user, id).await?;
    let card = validate_card(input, Utc::now().date_naive())?;
    let card = state.storage.insert_card(user.id, id, &card).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn remove_card(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((id, card_id)): Path<(i64, i64)>,
) -> Result<Json<Message>, AppError> {
    if !state.storage.delete_card(user.id, id, card_id).await? {
        return Err(AppError::NotFound("Card"));
    }
    Ok(message("Card deleted"))
}

pub async fn import(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ImportRequest>,
) -> Result<Json<ImportReport>, AppError> {
    let existing = state
        .storage
        .list_contacts(user.id, &ContactFilter::default())
        .await?;
    let keys = import::existing_contact_keys(&existing);
    let plan = import::plan_import::<ContactInput>(&req.csv, req.mapping.as_ref(), &keys)?;
    let (records, mut report) = plan.into_records(req.skip_duplicates);

    if req.dry_run {
        report.dry_run = true;
        return Ok(Json(report));
    }
    state.storage.insert_contacts(user.id, &records).await?;
    info!(
        user_id = user.id,
        imported = report.imported,
        errors = report.errors.len(),
        duplicates = report.duplicates.len(),
        "contact import"
    );
    Ok(Json(report))
}

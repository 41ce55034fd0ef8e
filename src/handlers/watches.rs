use crate::db::models::{User, WatchInput, WatchRecord, WatchView};
use crate::db::watches::WatchFilter;
use crate::error::AppError;
use crate::handlers::{Message, message};
use crate::middleware::{ApiJson, ApiQuery, AuthUser};
use crate::router::AppState;
use crate::service::import::{self, ImportReport, ImportRequest};
use crate::service::profit::{self, InventoryStats};
use crate::service::tiers;
use crate::service::validation::validate_watch;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

/// Buyer and seller must be the caller's own contacts.
async fn check_contact_refs(state: &AppState, user: &User, rec: &WatchRecord) -> Result<(), AppError> {
    for (field, id) in [
        ("seller_contact_id", rec.seller_contact_id),
        ("buyer_contact_id", rec.buyer_contact_id),
    ] {
        if let Some(id) = id
            && !state.storage.contact_exists(user.id, id).await?
        {
            return Err(AppError::validation(format!(
                "{field} does not match one of your contacts"
            )));
        }
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(filter): ApiQuery<WatchFilter>,
) -> Result<Json<Vec<WatchView>>, AppError> {
    let watches = state.storage.list_watches(user.id, &filter).await?;
    Ok(Json(watches.into_iter().map(|w| w.view()).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<WatchView>, AppError> {
    let watch = state
        .storage
        .get_watch(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Watch"))?;
    Ok(Json(watch.view()))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(input): ApiJson<WatchInput>,
) -> Result<(StatusCode, Json<WatchView>), AppError> {
    let rec = validate_watch(input)?;
    check_contact_refs(&state, &user, &rec).await?;
    if rec.price_sold.is_none() {
        tiers::ensure_capacity(&state.storage, &user, 1).await?;
    }
    let watch = state.storage.insert_watch(user.id, &rec).await?;
    info!(user_id = user.id, watch_id = watch.id, "watch created");
    Ok((StatusCode::CREATED, Json(watch.view())))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<WatchInput>,
) -> Result<Json<WatchView>, AppError> {
    let current = state
        .storage
        .get_watch(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Watch"))?;
    let rec = validate_watch(input)?;
    check_contact_refs(&state, &user, &rec).await?;
    // Un-selling a watch puts it back into the active inventory.
    if current.is_sold() && rec.price_sold.is_none() {
        tiers::ensure_capacity(&state.storage, &user, 1).await?;
    }
    if !state.storage.update_watch(user.id, id, &rec).await? {
        return Err(AppError::NotFound("Watch"));
    }
    let watch = state
        .storage
        .get_watch(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Watch"))?;
    Ok(Json(watch.view()))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Message>, AppError> {
    if !state.storage.delete_watch(user.id, id).await? {
        return Err(AppError::NotFound("Watch"));
    }
    info!(user_id = user.id, watch_id = id, "watch deleted");
    Ok(message("Watch deleted"))
}

pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<InventoryStats>, AppError> {
    let watches = state
        .storage
        .list_watches(user.id, &WatchFilter::default())
        .await?;
    Ok(Json(profit::inventory_stats(&watches)))
}

pub async fn import(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ImportRequest>,
) -> Result<Json<ImportReport>, AppError> {
    let existing = state
        .storage
        .list_watches(user.id, &WatchFilter::default())
        .await?;
    let keys = import::existing_watch_keys(&existing);
    let plan = import::plan_import::<WatchRecord>(&req.csv, req.mapping.as_ref(), &keys)?;
    let (records, mut report) = plan.into_records(req.skip_duplicates);

    if req.dry_run {
        report.dry_run = true;
        return Ok(Json(report));
    }
    let unsold = records.iter().filter(|r| r.price_sold.is_none()).count();
    tiers::ensure_capacity(&state.storage, &user, unsold as i64).await?;
    state.storage.insert_watches(user.id, &records).await?;
    info!(
        user_id = user.id,
        imported = report.imported,
        errors = report.errors.len(),
        duplicates = report.duplicates.len(),
        "watch import"
    );
    Ok(Json(report))
}

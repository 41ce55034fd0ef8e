use crate::db::models::{Invoice, InvoiceDetail};
use crate::error::AppError;
use crate::middleware::{ApiJson, AuthUser};
use crate::router::AppState;
use crate::service::billing::{self, CreateInvoiceRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(state.storage.list_invoices(user.id).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = state
        .storage
        .get_invoice_detail(user.id, id)
        .await?
        .ok_or(AppError::NotFound("Invoice"))?;
    Ok(Json(detail))
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetail>), AppError> {
    let detail = billing::create_invoice(
        &state.storage,
        &state.payments,
        &user,
        req,
        Utc::now().date_naive(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn void(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let detail = billing::void_invoice(&state.storage, &state.payments, &user, id).await?;
    Ok(Json(detail))
}

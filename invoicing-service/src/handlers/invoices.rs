//! Invoice handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::middleware::tracing::{current_request_id, with_request_id};
use validator::Validate;

use crate::{
    models::{CloseAttempt, Invoice, LineItemRequest},
    startup::AppState,
};

/// Request to create an invoice.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    #[validate(nested)]
    pub products: Vec<LineItemRequest>,
}

/// Response after closing an invoice.
#[derive(Debug, Serialize)]
pub struct CloseInvoiceResponse {
    pub message: String,
    pub invoice: Invoice,
}

/// Create and price a new open invoice.
pub async fn create_invoice(
    State(state): State<AppState>,
    payload: Result<Json<CreateInvoiceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid invoice data: {}",
            rejection.body_text()
        ))
    })?;

    payload.validate()?;

    tracing::info!(item_count = payload.products.len(), "Creating invoice");

    let invoice = state.invoices.create_invoice(&payload.products).await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

/// List open invoices, newest first.
pub async fn list_open_invoices(State(state): State<AppState>) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = state.store.list_open().await?;
    Ok(Json(invoices))
}

/// Close an invoice and decrement stock for its line items.
///
/// The close runs on its own task so a client disconnect cannot interrupt it
/// between the status change and the stock update.
pub async fn close_invoice(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CloseInvoiceResponse>, AppError> {
    if code.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invoice code is required")));
    }

    tracing::info!(code = %code, "Closing invoice");

    let coordinator = state.coordinator.clone();
    let request_id = current_request_id();
    let invoice = tokio::spawn(with_request_id(request_id, async move {
        coordinator.close_invoice(&code).await
    }))
    .await
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("Close task failed: {}", e)))??;

    Ok(Json(CloseInvoiceResponse {
        message: "Invoice successfully closed and stock updated".to_string(),
        invoice,
    }))
}

/// Close attempts that may have left an invoice and stock out of step.
pub async fn consistency_gaps(
    State(state): State<AppState>,
) -> Result<Json<Vec<CloseAttempt>>, AppError> {
    let gaps = state.store.list_consistency_gaps().await?;
    Ok(Json(gaps))
}

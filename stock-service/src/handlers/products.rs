//! Product catalog and balance update handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    models::{BalanceDecrement, CreateProduct, Product},
    services::{
        metrics::{ERRORS_TOTAL, PRODUCTS_CREATED},
        StockError,
    },
    startup::AppState,
};

/// Request to create a product.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(
        custom(function = "non_blank_name"),
        length(max = 255, message = "name is too long")
    )]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "non_negative_price"))]
    pub price: Decimal,
    #[validate(range(min = 0, message = "balance cannot be negative"))]
    pub balance: i32,
}

fn non_blank_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("name is required".into());
        return Err(err);
    }
    Ok(())
}

fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

/// One line of a balance update request.
#[derive(Debug, Deserialize)]
pub struct BalanceUpdateItem {
    pub product_id: String,
    pub quantity: i32,
}

/// Body of every balance update response.
#[derive(Debug, Serialize)]
pub struct BalanceUpdateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

impl BalanceUpdateResponse {
    fn failure(status: StatusCode, error: String, product_id: Option<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success: false,
                message: None,
                error: Some(error),
                product_id,
            }),
        )
    }
}

/// Register a new product.
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid product data: {}",
            rejection.body_text()
        ))
    })?;

    payload.validate()?;

    let input = CreateProduct {
        name: payload.name.trim().to_string(),
        description: payload.description,
        price: payload.price,
        balance: payload.balance,
    };

    let product = state.store.create_product(&input).await.map_err(|e| {
        PRODUCTS_CREATED.with_label_values(&["error"]).inc();
        ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
        e
    })?;

    PRODUCTS_CREATED.with_label_values(&["ok"]).inc();

    Ok((StatusCode::CREATED, Json(product)))
}

/// List every product, ordered by name.
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.store.list_products().await?;
    Ok(Json(products))
}

/// Fetch one product. Ids that are not UUIDs are reported as not found.
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let not_found = || AppError::NotFound(anyhow::anyhow!("Product not found"));

    let id = Uuid::parse_str(&product_id).map_err(|_| not_found())?;
    let product = state.store.get_product(id).await?.ok_or_else(not_found)?;

    Ok(Json(product))
}

/// Decrement the balance of every listed product, all or nothing.
pub async fn balance_update(
    State(state): State<AppState>,
    payload: Result<Json<Vec<BalanceUpdateItem>>, JsonRejection>,
) -> (StatusCode, Json<BalanceUpdateResponse>) {
    let Json(items) = match payload {
        Ok(items) => items,
        Err(rejection) => {
            return BalanceUpdateResponse::failure(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", rejection.body_text()),
                None,
            );
        }
    };

    let decrements: Vec<BalanceDecrement> = items
        .into_iter()
        .map(|item| BalanceDecrement::new(item.product_id, item.quantity))
        .collect();

    tracing::info!(item_count = decrements.len(), "Updating stock balances");

    match state.store.decrement_balances(&decrements).await {
        Ok(()) => (
            StatusCode::OK,
            Json(BalanceUpdateResponse {
                success: true,
                message: Some(format!("Stock updated for {} products", decrements.len())),
                error: None,
                product_id: None,
            }),
        ),
        Err(e) => {
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            let status = match e {
                StockError::Validation(_) => StatusCode::BAD_REQUEST,
                StockError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                StockError::InsufficientStock { .. } | StockError::DuplicateName(_) => {
                    StatusCode::CONFLICT
                }
                StockError::Persistence(_) => {
                    tracing::error!(error = %e, "Stock update failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            let product_id = e.product_id().map(str::to_string);
            BalanceUpdateResponse::failure(status, e.to_string(), product_id)
        }
    }
}

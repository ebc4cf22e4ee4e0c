//! Line item model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Stored line item. The unit price is the catalog price when the invoice was
/// created and is never re-read.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InvoiceLineItem {
    pub id: Uuid,
    pub invoice_code: String,
    pub product_id: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A requested (product, quantity) pair.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LineItemRequest {
    #[validate(length(min = 1, message = "product_id is required"))]
    pub product_id: String,
    #[serde(alias = "amount")]
    pub quantity: i32,
}

impl LineItemRequest {
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A line item priced against the catalog, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLineItem {
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub name: Option<String>,
}

impl PricedLineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

//! Product model for stock-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A product and its on-hand balance.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    #[serde(rename = "id")]
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub balance: i32,
    #[serde(skip_serializing)]
    pub created_utc: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub balance: i32,
}

/// One line of a balance decrement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDecrement {
    /// Product identifier as sent by the caller. Ids that are not UUIDs never
    /// match a product.
    pub product_id: String,
    pub quantity: i32,
}

impl BalanceDecrement {
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

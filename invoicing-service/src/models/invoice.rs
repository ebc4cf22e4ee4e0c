//! Invoice model for invoicing-service.

use crate::models::InvoiceLineItem;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Open,
    Closed,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Open => "open",
            InvoiceStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown invoice status: {0}")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for InvoiceStatus {
    type Error = UnknownStatus;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "open" => Ok(InvoiceStatus::Open),
            "closed" => Ok(InvoiceStatus::Closed),
            _ => Err(UnknownStatus(s)),
        }
    }
}

/// Invoice header with its line items attached on read.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub code: String,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    #[serde(rename = "totalValue", with = "rust_decimal::serde::float")]
    pub total_value: Decimal,
    #[sqlx(skip)]
    pub products: Vec<InvoiceLineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_closed(&self) -> bool {
        self.status == InvoiceStatus::Closed
    }
}

/// A priced invoice ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub code: String,
    pub line_items: Vec<crate::models::PricedLineItem>,
    pub total: Decimal,
}

//! Pricing of requested line items against the catalog.

use crate::models::{LineItemRequest, PricedLineItem};
use crate::services::{Catalog, CatalogError};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("{0}")]
    Validation(String),

    #[error("Error getting product {product_id}")]
    Catalog {
        product_id: String,
        #[source]
        source: CatalogError,
    },
}

impl PricingError {
    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PricingError::Validation(_) => "validation",
            PricingError::Catalog { source, .. } => source.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedInvoice {
    pub line_items: Vec<PricedLineItem>,
    pub total: Decimal,
}

/// Reject requests that can never be priced, before the catalog is called.
pub fn validate_items(items: &[LineItemRequest]) -> Result<(), PricingError> {
    if items.is_empty() {
        return Err(PricingError::Validation(
            "At least one product is required".to_string(),
        ));
    }
    if let Some(item) = items.iter().find(|item| item.quantity <= 0) {
        return Err(PricingError::Validation(format!(
            "Quantity must be greater than zero for product {}",
            item.product_id
        )));
    }
    Ok(())
}

/// Price every item in input order. The first catalog failure aborts pricing.
#[instrument(skip(catalog, items), fields(item_count = items.len()))]
pub async fn price_invoice(
    catalog: &dyn Catalog,
    items: &[LineItemRequest],
) -> Result<PricedInvoice, PricingError> {
    validate_items(items)?;

    let mut line_items = Vec::with_capacity(items.len());
    for item in items {
        let product = catalog
            .fetch_product(&item.product_id)
            .await
            .map_err(|source| PricingError::Catalog {
                product_id: item.product_id.clone(),
                source,
            })?;

        debug!(
            product_id = %item.product_id,
            quantity = item.quantity,
            unit_price = %product.price,
            "Priced line item"
        );

        line_items.push(PricedLineItem {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price: product.price,
            name: Some(product.name),
        });
    }

    let total = line_items.iter().map(PricedLineItem::subtotal).sum();

    Ok(PricedInvoice { line_items, total })
}

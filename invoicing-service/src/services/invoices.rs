//! Invoice creation: validate, price, then persist under a fresh code.

use crate::models::{Invoice, LineItemRequest, NewInvoice};
use crate::services::code_generator::next_code;
use crate::services::metrics::{CODE_CONFLICTS_TOTAL, ERRORS_TOTAL, INVOICES_TOTAL};
use crate::services::pricing::{price_invoice, PricingError};
use crate::services::{Catalog, InvoiceStore, StoreError};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Attempts at finding an unused code before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum CreateInvoiceError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
    catalog: Arc<dyn Catalog>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn InvoiceStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { store, catalog }
    }

    /// Create an invoice dated today (UTC).
    pub async fn create_invoice(&self, items: &[LineItemRequest]) -> Result<Invoice, CreateInvoiceError> {
        self.create_invoice_on(Utc::now().date_naive(), items).await
    }

    /// Create an invoice whose code is taken from `date`. Nothing is stored
    /// when pricing fails.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_invoice_on(
        &self,
        date: NaiveDate,
        items: &[LineItemRequest],
    ) -> Result<Invoice, CreateInvoiceError> {
        let priced = price_invoice(self.catalog.as_ref(), items).await.map_err(|e| {
            INVOICES_TOTAL.with_label_values(&["pricing_error"]).inc();
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
            e
        })?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = next_code(self.store.as_ref(), date)
                .await
                .map_err(store_failure)?;
            let new_invoice = NewInvoice {
                code,
                line_items: priced.line_items.clone(),
                total: priced.total,
            };

            match self.store.create_invoice(&new_invoice).await {
                Ok(invoice) => {
                    if attempt > 1 {
                        CODE_CONFLICTS_TOTAL.with_label_values(&["true"]).inc();
                    }
                    INVOICES_TOTAL.with_label_values(&["ok"]).inc();
                    info!(code = %invoice.code, total = %invoice.total_value, "Invoice created");
                    return Ok(invoice);
                }
                Err(StoreError::DuplicateCode(code)) if attempt < MAX_CODE_ATTEMPTS => {
                    warn!(code = %code, attempt = attempt, "Invoice code taken, retrying");
                }
                Err(e) => {
                    if matches!(e, StoreError::DuplicateCode(_)) {
                        CODE_CONFLICTS_TOTAL.with_label_values(&["false"]).inc();
                    }
                    return Err(store_failure(e));
                }
            }
        }
    }
}

fn store_failure(e: StoreError) -> CreateInvoiceError {
    INVOICES_TOTAL.with_label_values(&["store_error"]).inc();
    ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
    e.into()
}

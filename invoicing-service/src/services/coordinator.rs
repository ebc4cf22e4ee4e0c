//! Closing an invoice across the invoice store and the stock service.
//!
//! The two stores commit independently. The invoice is marked closed first,
//! then stock is decremented; if that fails the invoice is reopened. Each
//! attempt is recorded so an interrupted or failed reopen can be found later.

use crate::models::{CloseOutcome, Invoice, InvoiceStatus};
use crate::services::metrics::{CLOSE_ATTEMPTS_TOTAL, ERRORS_TOTAL};
use crate::services::{InvoiceStore, LedgerError, StockDecrement, StockLedger, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CloseError {
    #[error("Invoice not found")]
    NotFound(String),

    #[error("Invoice is already closed")]
    AlreadyClosed(String),

    /// Stock was not decremented and the invoice was reopened (or the reopen
    /// failed and the attempt is recorded as a consistency gap).
    #[error("Error updating stock: {0}")]
    Stock(#[source] LedgerError),

    #[error(transparent)]
    Store(StoreError),
}

#[derive(Clone)]
pub struct ReconciliationCoordinator {
    store: Arc<dyn InvoiceStore>,
    ledger: Arc<dyn StockLedger>,
}

impl ReconciliationCoordinator {
    pub fn new(store: Arc<dyn InvoiceStore>, ledger: Arc<dyn StockLedger>) -> Self {
        Self { store, ledger }
    }

    /// Close an open invoice and decrement stock for its line items.
    #[instrument(skip(self))]
    pub async fn close_invoice(&self, code: &str) -> Result<Invoice, CloseError> {
        let invoice = self
            .store
            .get_by_code(code)
            .await
            .map_err(CloseError::Store)?
            .ok_or_else(|| CloseError::NotFound(code.to_string()))?;

        if invoice.is_closed() {
            CLOSE_ATTEMPTS_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(CloseError::AlreadyClosed(code.to_string()));
        }

        let decrements: Vec<StockDecrement> = invoice
            .products
            .iter()
            .map(|item| StockDecrement::new(item.product_id.clone(), item.quantity))
            .collect();

        let attempt = match self.store.begin_close_attempt(code).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to record close attempt");
                None
            }
        };

        if let Err(e) = self.store.set_status(code, InvoiceStatus::Closed).await {
            let err = match e {
                StoreError::InvalidTransition { .. } => {
                    CLOSE_ATTEMPTS_TOTAL.with_label_values(&["rejected"]).inc();
                    CloseError::AlreadyClosed(code.to_string())
                }
                StoreError::NotFound(_) => CloseError::NotFound(code.to_string()),
                other => {
                    ERRORS_TOTAL.with_label_values(&[other.kind()]).inc();
                    CloseError::Store(other)
                }
            };
            self.finish(attempt, CloseOutcome::Rejected, Some(&err.to_string()))
                .await;
            return Err(err);
        }

        match self.ledger.decrement_balances(&decrements).await {
            Ok(()) => {
                self.finish(attempt, CloseOutcome::Closed, None).await;
                CLOSE_ATTEMPTS_TOTAL.with_label_values(&["closed"]).inc();
                info!(code = %code, products = decrements.len(), "Invoice closed and stock updated");

                let closed = self
                    .store
                    .get_by_code(code)
                    .await
                    .map_err(CloseError::Store)?
                    .ok_or_else(|| CloseError::NotFound(code.to_string()))?;
                Ok(closed)
            }
            Err(stock_err) => {
                warn!(code = %code, error = %stock_err, "Stock update failed, reopening invoice");
                ERRORS_TOTAL.with_label_values(&[stock_err.kind()]).inc();

                match self.store.set_status(code, InvoiceStatus::Open).await {
                    Ok(()) => {
                        self.finish(attempt, CloseOutcome::Reopened, Some(&stock_err.to_string()))
                            .await;
                        CLOSE_ATTEMPTS_TOTAL.with_label_values(&["reopened"]).inc();
                    }
                    Err(reopen_err) => {
                        error!(
                            code = %code,
                            error = %reopen_err,
                            stock_error = %stock_err,
                            "Failed to reopen invoice after stock update failure"
                        );
                        let detail = format!("stock: {}; reopen: {}", stock_err, reopen_err);
                        self.finish(attempt, CloseOutcome::CompensationFailed, Some(&detail))
                            .await;
                        CLOSE_ATTEMPTS_TOTAL
                            .with_label_values(&["compensation_failed"])
                            .inc();
                        ERRORS_TOTAL
                            .with_label_values(&["compensation_failed"])
                            .inc();
                    }
                }

                Err(CloseError::Stock(stock_err))
            }
        }
    }

    async fn finish(&self, attempt: Option<Uuid>, outcome: CloseOutcome, detail: Option<&str>) {
        let Some(id) = attempt else { return };
        if let Err(e) = self.store.finish_close_attempt(id, outcome, detail).await {
            warn!(attempt_id = %id, outcome = outcome.as_str(), error = %e, "Failed to finish close attempt");
        }
    }
}

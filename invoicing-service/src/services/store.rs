use crate::models::{CloseAttempt, CloseOutcome, Invoice, InvoiceStatus, NewInvoice};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invoice not found: {0}")]
    NotFound(String),

    #[error("Invoice {code} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        code: String,
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    #[error("Invoice code already exists: {0}")]
    DuplicateCode(String),

    #[error("Database error: {0}")]
    Persistence(anyhow::Error),
}

impl StoreError {
    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "invoice_not_found",
            StoreError::InvalidTransition { .. } => "invalid_transition",
            StoreError::DuplicateCode(_) => "duplicate_code",
            StoreError::Persistence(_) => "persistence",
        }
    }
}

/// Storage for invoices, their line items and close attempts.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Insert the header and every line item in one transaction.
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice, StoreError>;

    /// Open invoices with line items, newest first.
    async fn list_open(&self) -> Result<Vec<Invoice>, StoreError>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Invoice>, StoreError>;

    /// Closing only succeeds from `Open`, so two racing closes cannot both win.
    async fn set_status(&self, code: &str, status: InvoiceStatus) -> Result<(), StoreError>;

    /// Number of invoices whose code starts with `prefix`.
    async fn count_codes_for_date(&self, prefix: &str) -> Result<i64, StoreError>;

    async fn begin_close_attempt(&self, code: &str) -> Result<Uuid, StoreError>;

    async fn finish_close_attempt(
        &self,
        attempt_id: Uuid,
        outcome: CloseOutcome,
        detail: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Close attempts left in progress or whose compensation failed.
    async fn list_consistency_gaps(&self) -> Result<Vec<CloseAttempt>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

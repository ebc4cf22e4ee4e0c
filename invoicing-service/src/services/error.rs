//! HTTP mapping of the invoicing error types.

use crate::services::coordinator::CloseError;
use crate::services::invoices::CreateInvoiceError;
use crate::services::pricing::PricingError;
use crate::services::{CatalogError, LedgerError, StoreError};
use service_core::error::AppError;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(anyhow::anyhow!("Invoice not found")),
            e @ StoreError::InvalidTransition { .. } => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            e @ StoreError::DuplicateCode(_) => AppError::Conflict(anyhow::anyhow!(e.to_string())),
            StoreError::Persistence(e) => AppError::DatabaseError(e),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            e @ CatalogError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            e @ CatalogError::Unavailable(_) => {
                AppError::UpstreamError("Error fetching product".to_string(), anyhow::Error::new(e))
            }
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::UpstreamError("Error updating stock".to_string(), anyhow::Error::new(err))
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            PricingError::Catalog {
                source: source @ CatalogError::NotFound(_),
                ..
            } => source.into(),
            e @ PricingError::Catalog { .. } => AppError::UpstreamError(
                "Error calculating invoice total value".to_string(),
                anyhow::Error::new(e),
            ),
        }
    }
}

impl From<CreateInvoiceError> for AppError {
    fn from(err: CreateInvoiceError) -> Self {
        match err {
            CreateInvoiceError::Pricing(e) => e.into(),
            CreateInvoiceError::Store(e @ StoreError::DuplicateCode(_)) => {
                AppError::InternalError(anyhow::Error::new(e).context("Error generating invoice code"))
            }
            CreateInvoiceError::Store(StoreError::Persistence(e)) => {
                AppError::DatabaseError(e.context("Error creating invoice"))
            }
            CreateInvoiceError::Store(e) => e.into(),
        }
    }
}

impl From<CloseError> for AppError {
    fn from(err: CloseError) -> Self {
        match err {
            e @ CloseError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            e @ CloseError::AlreadyClosed(_) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            CloseError::Stock(e) => AppError::UpstreamError(
                "Error updating stock, invoice reopened".to_string(),
                anyhow::Error::new(e),
            ),
            CloseError::Store(e) => e.into(),
        }
    }
}

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StockError {
    #[error("{0}")]
    Validation(String),

    #[error("Product with this name already exists")]
    DuplicateName(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Insufficient stock for product: {product_id} (requested {requested}, available {available})")]
    InsufficientStock {
        product_id: String,
        requested: i32,
        available: i32,
    },

    #[error("Database error: {0}")]
    Persistence(anyhow::Error),
}

impl StockError {
    /// Product the error is about, when there is one.
    pub fn product_id(&self) -> Option<&str> {
        match self {
            StockError::ProductNotFound(id) => Some(id),
            StockError::InsufficientStock { product_id, .. } => Some(product_id),
            _ => None,
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StockError::Validation(_) => "validation",
            StockError::DuplicateName(_) => "duplicate_name",
            StockError::ProductNotFound(_) => "product_not_found",
            StockError::InsufficientStock { .. } => "insufficient_stock",
            StockError::Persistence(_) => "persistence",
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            e @ StockError::DuplicateName(_) => AppError::Conflict(anyhow::anyhow!(e.to_string())),
            e @ StockError::ProductNotFound(_) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            e @ StockError::InsufficientStock { .. } => {
                AppError::Conflict(anyhow::anyhow!(e.to_string()))
            }
            StockError::Persistence(e) => AppError::DatabaseError(e),
        }
    }
}

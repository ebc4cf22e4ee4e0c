//! Client for the stock service: product lookups and balance decrements.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Current catalog data for a product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogProduct {
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Stock service unavailable: {0}")]
    Unavailable(String),
}

impl CatalogError {
    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::NotFound(_) => "product_not_found",
            CatalogError::Unavailable(_) => "unavailable",
        }
    }
}

/// One line of a stock decrement sent to the stock service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockDecrement {
    pub product_id: String,
    pub quantity: i32,
}

impl StockDecrement {
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Insufficient stock for product: {0}")]
    InsufficientStock(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Stock update rejected: {0}")]
    Validation(String),

    #[error("Stock service failed to update balances: {0}")]
    Persistence(String),

    #[error("Stock service unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InsufficientStock(_) => "insufficient_stock",
            LedgerError::ProductNotFound(_) => "product_not_found",
            LedgerError::Validation(_) => "validation",
            LedgerError::Persistence(_) => "persistence",
            LedgerError::Unavailable(_) => "unavailable",
        }
    }
}

/// Read-only product lookup.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn fetch_product(&self, product_id: &str) -> Result<CatalogProduct, CatalogError>;
}

/// All-or-nothing balance decrement owned by the stock service.
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn decrement_balances(&self, items: &[StockDecrement]) -> Result<(), LedgerError>;
}

#[derive(Debug, Deserialize)]
struct BalanceUpdateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for the stock service.
#[derive(Clone)]
pub struct StockServiceClient {
    client: Client,
    base_url: String,
    catalog_timeout: Duration,
    update_timeout: Duration,
}

impl StockServiceClient {
    pub fn new(base_url: impl Into<String>, catalog_timeout: Duration, update_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            catalog_timeout,
            update_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded as a single
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| format!("invalid stock service url {}: {}", self.base_url, e))?;
        url.path_segments_mut()
            .map_err(|_| format!("invalid stock service url {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl Catalog for StockServiceClient {
    #[instrument(skip(self))]
    async fn fetch_product(&self, product_id: &str) -> Result<CatalogProduct, CatalogError> {
        let url = self
            .endpoint(&["product", product_id])
            .map_err(CatalogError::Unavailable)?;

        let response = self
            .client
            .traced_get(url.as_str())
            .timeout(self.catalog_timeout)
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("error calling stock service: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(product_id.to_string()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("error reading response body: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(CatalogError::Unavailable(format!(
                "stock service returned {}: {}",
                status, detail
            )));
        }

        let product: CatalogProduct = serde_json::from_str(&body).map_err(|e| {
            CatalogError::Unavailable(format!("error decoding product response: {}", e))
        })?;

        info!(product_id = %product_id, price = %product.price, "Product retrieved");

        Ok(product)
    }
}

#[async_trait]
impl StockLedger for StockServiceClient {
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    async fn decrement_balances(&self, items: &[StockDecrement]) -> Result<(), LedgerError> {
        let url = self
            .endpoint(&["products", "balance-update"])
            .map_err(LedgerError::Unavailable)?;

        let response = self
            .client
            .traced_put(url.as_str())
            .json(items)
            .timeout(self.update_timeout)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("error calling stock service: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("error reading response body: {}", e)))?;

        let parsed = serde_json::from_str::<BalanceUpdateResponse>(&body).ok();

        if status.is_success() {
            return match parsed {
                Some(r) if r.success => {
                    info!(message = r.message.as_deref().unwrap_or(""), "Stock updated");
                    Ok(())
                }
                Some(r) => Err(LedgerError::Persistence(
                    r.error.or(r.message).unwrap_or_else(|| "unknown failure".to_string()),
                )),
                None => Err(LedgerError::Unavailable(format!(
                    "error decoding stock service response: {}",
                    body
                ))),
            };
        }

        let (error, product_id) = match parsed {
            Some(r) => (r.error.unwrap_or_else(|| body.clone()), r.product_id),
            None => (body.clone(), None),
        };
        warn!(status = %status, error = %error, "Stock service rejected balance update");

        let product = || product_id.clone().unwrap_or_else(|| error.clone());
        Err(match status {
            StatusCode::CONFLICT => LedgerError::InsufficientStock(product()),
            StatusCode::NOT_FOUND => LedgerError::ProductNotFound(product()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                LedgerError::Validation(error.clone())
            }
            s if s.is_server_error() => {
                LedgerError::Persistence(format!("stock service returned {}: {}", s, error))
            }
            s => LedgerError::Unavailable(format!("stock service returned {}: {}", s, error)),
        })
    }
}

//! Common test utilities for invoicing-service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use invoicing_service::models::{
    CloseAttempt, CloseOutcome, Invoice, InvoiceLineItem, InvoiceStatus, NewInvoice,
};
use invoicing_service::services::{
    Catalog, CatalogError, CatalogProduct, Database, InvoiceStore, LedgerError, StockDecrement,
    StockLedger, StoreError,
};
use invoicing_service::startup::{router, AppState};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tower::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Default)]
struct StoreState {
    invoices: Vec<Invoice>,
    attempts: Vec<CloseAttempt>,
}

/// Invoice store held in memory, with switches for injecting failures.
#[derive(Default)]
pub struct MemoryInvoiceStore {
    state: Mutex<StoreState>,
    /// Number of writes (creates and status changes) that reached the store.
    pub writes: AtomicUsize,
    /// Make reopening an invoice fail.
    pub fail_reopen: AtomicBool,
    /// Make the next N code counts report zero, as if read before a
    /// concurrent insert committed.
    pub stale_counts: AtomicUsize,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, code: &str) -> Option<InvoiceStatus> {
        self.state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .find(|i| i.code == code)
            .map(|i| i.status)
    }

    pub fn attempts(&self) -> Vec<CloseAttempt> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn invoice_count(&self) -> usize {
        self.state.lock().unwrap().invoices.len()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.invoices.iter().any(|i| i.code == invoice.code) {
            return Err(StoreError::DuplicateCode(invoice.code.clone()));
        }
        if invoice.line_items.iter().any(|item| item.quantity <= 0) {
            return Err(StoreError::Persistence(anyhow::anyhow!(
                "violates check constraint on quantity"
            )));
        }

        let now = Utc::now();
        let created = Invoice {
            id: Uuid::new_v4(),
            code: invoice.code.clone(),
            status: InvoiceStatus::Open,
            total_value: invoice.total,
            products: invoice
                .line_items
                .iter()
                .map(|item| InvoiceLineItem {
                    id: Uuid::new_v4(),
                    invoice_code: invoice.code.clone(),
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    name: item.name.clone(),
                    created_at: now,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };
        state.invoices.push(created.clone());
        Ok(created)
    }

    async fn list_open(&self) -> Result<Vec<Invoice>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .rev()
            .filter(|i| i.status == InvoiceStatus::Open)
            .cloned()
            .collect())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .find(|i| i.code == code)
            .cloned())
    }

    async fn set_status(&self, code: &str, status: InvoiceStatus) -> Result<(), StoreError> {
        if status == InvoiceStatus::Open && self.fail_reopen.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence(anyhow::anyhow!("connection reset")));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| i.code == code)
            .ok_or_else(|| StoreError::NotFound(code.to_string()))?;

        if status == InvoiceStatus::Closed && invoice.status == InvoiceStatus::Closed {
            return Err(StoreError::InvalidTransition {
                code: code.to_string(),
                from: InvoiceStatus::Closed,
                to: InvoiceStatus::Closed,
            });
        }
        invoice.status = status;
        invoice.updated_at = Utc::now();
        Ok(())
    }

    async fn count_codes_for_date(&self, prefix: &str) -> Result<i64, StoreError> {
        let stale = self
            .stale_counts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(0);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .invoices
            .iter()
            .filter(|i| i.code.starts_with(prefix))
            .count() as i64)
    }

    async fn begin_close_attempt(&self, code: &str) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().attempts.push(CloseAttempt {
            id,
            invoice_code: code.to_string(),
            outcome: CloseOutcome::InProgress,
            detail: None,
            started_at: Utc::now(),
            finished_at: None,
        });
        Ok(id)
    }

    async fn finish_close_attempt(
        &self,
        attempt_id: Uuid,
        outcome: CloseOutcome,
        detail: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(attempt) = state.attempts.iter_mut().find(|a| a.id == attempt_id) {
            attempt.outcome = outcome;
            attempt.detail = detail.map(str::to_string);
            attempt.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_consistency_gaps(&self) -> Result<Vec<CloseAttempt>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .attempts
            .iter()
            .filter(|a| a.outcome.is_gap())
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Clone)]
struct StockItem {
    name: String,
    price: Decimal,
    balance: i32,
}

/// Stock service stand-in: a catalog plus all-or-nothing balances.
#[derive(Default)]
pub struct FakeStock {
    products: Mutex<HashMap<String, StockItem>>,
    /// When set, every decrement fails with this error and changes nothing.
    pub fail_with: Mutex<Option<LedgerError>>,
    pub catalog_calls: AtomicUsize,
}

impl FakeStock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(self, id: &str, price: Decimal, balance: i32) -> Self {
        self.products.lock().unwrap().insert(
            id.to_string(),
            StockItem {
                name: format!("Product {id}"),
                price,
                balance,
            },
        );
        self
    }

    pub fn balance(&self, id: &str) -> Option<i32> {
        self.products.lock().unwrap().get(id).map(|p| p.balance)
    }

    pub fn set_price(&self, id: &str, price: Decimal) {
        if let Some(p) = self.products.lock().unwrap().get_mut(id) {
            p.price = price;
        }
    }
}

#[async_trait]
impl Catalog for FakeStock {
    async fn fetch_product(&self, product_id: &str) -> Result<CatalogProduct, CatalogError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.products
            .lock()
            .unwrap()
            .get(product_id)
            .map(|p| CatalogProduct {
                name: p.name.clone(),
                price: p.price,
            })
            .ok_or_else(|| CatalogError::NotFound(product_id.to_string()))
    }
}

#[async_trait]
impl StockLedger for FakeStock {
    async fn decrement_balances(&self, items: &[StockDecrement]) -> Result<(), LedgerError> {
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }

        let mut products = self.products.lock().unwrap();
        let mut next = products.clone();
        for item in items {
            let product = next
                .get_mut(&item.product_id)
                .ok_or_else(|| LedgerError::ProductNotFound(item.product_id.clone()))?;
            if product.balance < item.quantity {
                return Err(LedgerError::InsufficientStock(item.product_id.clone()));
            }
            product.balance -= item.quantity;
        }
        *products = next;
        Ok(())
    }
}

/// Router over in-memory collaborators.
pub fn memory_app(store: Arc<MemoryInvoiceStore>, stock: Arc<FakeStock>) -> Router {
    init_tracing();
    let state = AppState::new(store, stock.clone(), stock);
    router(state, &["http://localhost:4200".to_string()])
}

/// Postgres-backed store for tests, or `None` when `TEST_DATABASE_URL` is unset.
pub async fn test_database() -> Option<Database> {
    init_tracing();

    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let db = Database::new(&database_url, 5, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");
    Some(db)
}

/// Invoice code that will not collide with other tests.
pub fn unique_code() -> String {
    format!("T{}", &Uuid::new_v4().simple().to_string()[..16])
}

/// Send a request through the router and decode the JSON body.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

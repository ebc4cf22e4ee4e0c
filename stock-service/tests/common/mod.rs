//! Common test utilities for stock-service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use stock_service::models::{BalanceDecrement, CreateProduct, Product};
use stock_service::services::ledger::{plan_decrements, validate_request};
use stock_service::services::{Database, ProductStore, StockError};
use stock_service::startup::{router, AppState};
use tower::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,stock_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Product store held in memory. Decrements go through the same sufficiency
/// checks as the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    products: Mutex<Vec<Product>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, product_id: Uuid) -> Option<i32> {
        self.products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.product_id == product_id)
            .map(|p| p.balance)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn create_product(&self, input: &CreateProduct) -> Result<Product, StockError> {
        let mut products = self.products.lock().unwrap();
        if products.iter().any(|p| p.name == input.name) {
            return Err(StockError::DuplicateName(input.name.clone()));
        }
        let now = Utc::now();
        let product = Product {
            product_id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            balance: input.balance,
            created_utc: now,
            updated_utc: now,
        };
        products.push(product.clone());
        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>, StockError> {
        let mut products = self.products.lock().unwrap().clone();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, StockError> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.product_id == product_id)
            .cloned())
    }

    async fn decrement_balances(&self, items: &[BalanceDecrement]) -> Result<(), StockError> {
        validate_request(items)?;

        let mut products = self.products.lock().unwrap();
        let balances: HashMap<Uuid, i32> =
            products.iter().map(|p| (p.product_id, p.balance)).collect();

        for (product_id, quantity) in plan_decrements(items, &balances)? {
            if let Some(product) = products.iter_mut().find(|p| p.product_id == product_id) {
                product.balance -= quantity;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StockError> {
        Ok(())
    }
}

/// Router over an in-memory store.
pub fn memory_app() -> (Router, Arc<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone(),
    };
    let app = router(state, &["http://localhost:4200".to_string()]);
    (app, store)
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

/// Product name that will not collide with other tests.
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
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

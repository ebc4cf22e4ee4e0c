//! Database service for stock-service.

use crate::models::{BalanceDecrement, CreateProduct, Product};
use crate::services::ledger::{lock_order, plan_decrements, validate_request};
use crate::services::metrics::{DB_QUERY_DURATION, STOCK_DECREMENTS_TOTAL};
use crate::services::{ProductStore, StockError};
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "stock-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn db_error(context: &str, e: sqlx::Error) -> StockError {
    StockError::Persistence(anyhow::anyhow!("{}: {}", context, e))
}

#[async_trait]
impl ProductStore for Database {
    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_product(&self, input: &CreateProduct) -> Result<Product, StockError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, price, balance)
            VALUES ($1, $2, $3, $4)
            RETURNING product_id, name, description, price, balance, created_utc, updated_utc
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StockError::DuplicateName(input.name.clone())
            }
            _ => db_error("Failed to create product", e),
        })?;

        timer.observe_duration();

        info!(product_id = %product.product_id, name = %product.name, "Product created");

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, StockError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, name, description, price, balance, created_utc, updated_utc
            FROM products
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list products", e))?;

        timer.observe_duration();

        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, StockError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, name, description, price, balance, created_utc, updated_utc
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get product", e))?;

        timer.observe_duration();

        Ok(product)
    }

    /// Decrement balances for every line in one transaction.
    ///
    /// Rows are locked in id order, then the lines are checked in request
    /// order. The first missing product or short balance rolls everything back.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    async fn decrement_balances(&self, items: &[BalanceDecrement]) -> Result<(), StockError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["decrement_balances"])
            .start_timer();

        validate_request(items)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let ids = lock_order(items);
        let rows: Vec<(Uuid, i32)> = sqlx::query_as(
            r#"
            SELECT product_id, balance
            FROM products
            WHERE product_id = ANY($1)
            ORDER BY product_id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to lock product balances", e))?;

        let balances: HashMap<Uuid, i32> = rows.into_iter().collect();

        let plan = match plan_decrements(items, &balances) {
            Ok(plan) => plan,
            Err(e) => {
                tx.rollback().await.ok();
                warn!(error = %e, "Stock decrement rejected");
                STOCK_DECREMENTS_TOTAL.with_label_values(&[e.kind()]).inc();
                return Err(e);
            }
        };

        for (product_id, quantity) in &plan {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET balance = balance - $1, updated_utc = NOW()
                WHERE product_id = $2
                "#,
            )
            .bind(quantity)
            .bind(product_id)
            .execute(&mut *tx)
            .await;

            if let Err(e) = result {
                tx.rollback().await.ok();
                STOCK_DECREMENTS_TOTAL
                    .with_label_values(&["persistence"])
                    .inc();
                return Err(db_error("Failed to update stock", e));
            }
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();
        STOCK_DECREMENTS_TOTAL.with_label_values(&["ok"]).inc();

        info!(products = plan.len(), "Stock balances decremented");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StockError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }
}

//! Database service for invoicing-service.

use crate::models::{
    CloseAttempt, CloseOutcome, Invoice, InvoiceLineItem, InvoiceStatus, NewInvoice,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::{InvoiceStore, StoreError};
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
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

    async fn line_items_for(&self, codes: &[String]) -> Result<Vec<InvoiceLineItem>, StoreError> {
        sqlx::query_as::<_, InvoiceLineItem>(
            r#"
            SELECT id, invoice_code, product_id, quantity, unit_price, name, created_at
            FROM invoice_line_items
            WHERE invoice_code = ANY($1)
            ORDER BY invoice_code, position
            "#,
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get line items", e))
    }
}

fn db_error(context: &str, e: sqlx::Error) -> StoreError {
    StoreError::Persistence(anyhow::anyhow!("{}: {}", context, e))
}

const INVOICE_COLUMNS: &str = "id, code, status, total_value, created_at, updated_at";

#[async_trait]
impl InvoiceStore for Database {
    #[instrument(skip(self, invoice), fields(code = %invoice.code, items = invoice.line_items.len()))]
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let header = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (code, status, total_value)
            VALUES ($1, $2, $3)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(&invoice.code)
        .bind(InvoiceStatus::Open.as_str())
        .bind(invoice.total)
        .fetch_one(&mut *tx)
        .await;

        let mut created = match header {
            Ok(created) => created,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(match e {
                    sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                        StoreError::DuplicateCode(invoice.code.clone())
                    }
                    _ => db_error("Error creating invoice", e),
                });
            }
        };

        for (position, item) in invoice.line_items.iter().enumerate() {
            let inserted = sqlx::query_as::<_, InvoiceLineItem>(
                r#"
                INSERT INTO invoice_line_items (invoice_code, product_id, quantity, unit_price, name, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, invoice_code, product_id, quantity, unit_price, name, created_at
                "#,
            )
            .bind(&invoice.code)
            .bind(&item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(&item.name)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await;

            match inserted {
                Ok(line_item) => created.products.push(line_item),
                Err(e) => {
                    tx.rollback().await.ok();
                    return Err(db_error("Error creating invoice products", e));
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit transaction", e))?;

        timer.observe_duration();

        info!(invoice_id = %created.id, code = %created.code, total = %created.total_value, "Invoice created");

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn list_open(&self) -> Result<Vec<Invoice>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_open"])
            .start_timer();

        let mut invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE status = $1
            ORDER BY created_at DESC, code DESC
            "#
        ))
        .bind(InvoiceStatus::Open.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Error getting open invoices", e))?;

        let codes: Vec<String> = invoices.iter().map(|i| i.code.clone()).collect();
        let mut by_code: HashMap<String, Vec<InvoiceLineItem>> = HashMap::new();
        for item in self.line_items_for(&codes).await? {
            by_code.entry(item.invoice_code.clone()).or_default().push(item);
        }
        for invoice in &mut invoices {
            invoice.products = by_code.remove(&invoice.code).unwrap_or_default();
        }

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self))]
    async fn get_by_code(&self, code: &str) -> Result<Option<Invoice>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_by_code"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get invoice", e))?;

        let invoice = match invoice {
            Some(mut invoice) => {
                invoice.products = self.line_items_for(&[invoice.code.clone()]).await?;
                Some(invoice)
            }
            None => None,
        };

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, status), fields(status = status.as_str()))]
    async fn set_status(&self, code: &str, status: InvoiceStatus) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_status"])
            .start_timer();

        // Closing is conditional on the invoice still being open.
        let query = match status {
            InvoiceStatus::Closed => {
                "UPDATE invoices SET status = $1, updated_at = NOW() WHERE code = $2 AND status = 'open'"
            }
            InvoiceStatus::Open => {
                "UPDATE invoices SET status = $1, updated_at = NOW() WHERE code = $2"
            }
        };

        let result = sqlx::query(query)
            .bind(status.as_str())
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Error updating invoice status", e))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT status FROM invoices WHERE code = $1")
                    .bind(code)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("Failed to get invoice", e))?;

            return Err(match exists {
                None => StoreError::NotFound(code.to_string()),
                Some(_) => StoreError::InvalidTransition {
                    code: code.to_string(),
                    from: InvoiceStatus::Closed,
                    to: status,
                },
            });
        }

        info!(code = %code, status = status.as_str(), "Invoice status updated");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_codes_for_date(&self, prefix: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invoices WHERE code LIKE $1 || '%'")
            .bind(prefix)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Error generating invoice code", e))?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn begin_close_attempt(&self, code: &str) -> Result<Uuid, StoreError> {
        let (id,): (Uuid,) = sqlx::query_as(
            "INSERT INTO close_attempts (invoice_code, outcome) VALUES ($1, $2) RETURNING id",
        )
        .bind(code)
        .bind(CloseOutcome::InProgress.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record close attempt", e))?;
        Ok(id)
    }

    #[instrument(skip(self, outcome, detail), fields(outcome = outcome.as_str()))]
    async fn finish_close_attempt(
        &self,
        attempt_id: Uuid,
        outcome: CloseOutcome,
        detail: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE close_attempts
            SET outcome = $1, detail = $2, finished_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(outcome.as_str())
        .bind(detail)
        .bind(attempt_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to finish close attempt", e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_consistency_gaps(&self) -> Result<Vec<CloseAttempt>, StoreError> {
        sqlx::query_as::<_, CloseAttempt>(
            r#"
            SELECT id, invoice_code, outcome, detail, started_at, finished_at
            FROM close_attempts
            WHERE outcome IN ($1, $2)
            ORDER BY started_at
            "#,
        )
        .bind(CloseOutcome::InProgress.as_str())
        .bind(CloseOutcome::CompensationFailed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list consistency gaps", e))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Health check failed", e))?;
        Ok(())
    }
}

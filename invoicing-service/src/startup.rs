//! Application startup and lifecycle management.

use crate::config::InvoicingConfig;
use crate::handlers::invoices;
use crate::services::{
    get_metrics, init_metrics, Catalog, Database, InvoiceService, InvoiceStore,
    ReconciliationCoordinator, StockLedger, StockServiceClient,
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::cors::cors_layer;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InvoiceStore>,
    pub invoices: InvoiceService,
    pub coordinator: ReconciliationCoordinator,
}

impl AppState {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        catalog: Arc<dyn Catalog>,
        ledger: Arc<dyn StockLedger>,
    ) -> Self {
        Self {
            invoices: InvoiceService::new(store.clone(), catalog),
            coordinator: ReconciliationCoordinator::new(store.clone(), ledger),
            store,
        }
    }
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "invoicing-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "invoicing-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

/// HTTP routes of the service.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/invoice", post(invoices::create_invoice))
        .route("/invoices/open", get(invoices::list_open_invoices))
        .route("/invoices/consistency-gaps", get(invoices::consistency_gaps))
        .route("/invoices/:code/close", put(invoices::close_invoice))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Log every close attempt that may have left an invoice and stock out of
/// step. Resolving them is a manual task.
pub async fn report_consistency_gaps(store: &dyn InvoiceStore) -> Result<usize, AppError> {
    let gaps = store.list_consistency_gaps().await?;
    for gap in &gaps {
        tracing::warn!(
            attempt_id = %gap.id,
            invoice_code = %gap.invoice_code,
            outcome = gap.outcome.as_str(),
            started_at = %gap.started_at,
            detail = gap.detail.as_deref().unwrap_or(""),
            "Invoice close attempt left a consistency gap"
        );
    }
    if gaps.is_empty() {
        tracing::info!("No consistency gaps found");
    }
    Ok(gaps.len())
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        if let Err(e) = report_consistency_gaps(&db).await {
            tracing::warn!(error = %e, "Failed to check for consistency gaps");
        }

        let stock_client = Arc::new(StockServiceClient::new(
            config.stock_service.url.clone(),
            config.stock_service.catalog_timeout,
            config.stock_service.update_timeout,
        ));
        tracing::info!(endpoint = %stock_client.base_url(), "Stock service client configured");

        let state = AppState::new(Arc::new(db), stock_client.clone(), stock_client);

        Self::with_state(state, &config).await
    }

    /// Build the application around existing state. Used by tests.
    pub async fn with_state(state: AppState, config: &InvoicingConfig) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoicing service listener bound");

        Ok(Self {
            port,
            listener,
            router: router(state, &config.cors_allowed_origins),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, self.router).await
    }
}

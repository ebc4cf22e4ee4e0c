pub mod catalog;
pub mod code_generator;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod invoices;
pub mod metrics;
pub mod pricing;
pub mod store;

pub use catalog::{
    Catalog, CatalogError, CatalogProduct, LedgerError, StockDecrement, StockLedger,
    StockServiceClient,
};
pub use coordinator::{CloseError, ReconciliationCoordinator};
pub use database::Database;
pub use invoices::{CreateInvoiceError, InvoiceService};
pub use metrics::{get_metrics, init_metrics};
pub use store::{InvoiceStore, StoreError};

pub mod database;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod store;

pub use database::Database;
pub use error::StockError;
pub use metrics::{get_metrics, init_metrics};
pub use store::ProductStore;

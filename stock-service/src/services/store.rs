use crate::models::{BalanceDecrement, CreateProduct, Product};
use crate::services::StockError;
use async_trait::async_trait;
use uuid::Uuid;

/// Storage for products and their balances.
///
/// `decrement_balances` is all-or-nothing: either every line is applied or no
/// balance changes.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create_product(&self, input: &CreateProduct) -> Result<Product, StockError>;

    /// All products ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>, StockError>;

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, StockError>;

    async fn decrement_balances(&self, items: &[BalanceDecrement]) -> Result<(), StockError>;

    async fn health_check(&self) -> Result<(), StockError>;
}

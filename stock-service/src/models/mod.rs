//! Domain models for stock-service.

mod product;

pub use product::{BalanceDecrement, CreateProduct, Product};

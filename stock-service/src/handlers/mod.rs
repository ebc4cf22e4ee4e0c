//! HTTP handlers for stock-service.

pub mod products;

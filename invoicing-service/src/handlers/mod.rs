//! HTTP handlers for invoicing-service.

pub mod invoices;

//! Domain models for invoicing-service.

mod close_attempt;
mod invoice;
mod line_item;

pub use close_attempt::{CloseAttempt, CloseOutcome};
pub use invoice::{Invoice, InvoiceStatus, NewInvoice};
pub use line_item::{InvoiceLineItem, LineItemRequest, PricedLineItem};

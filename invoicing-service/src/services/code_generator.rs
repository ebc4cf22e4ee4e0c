//! Per-day invoice codes: `YYYYMMDD` followed by a sequence number.
//!
//! The count and the insert that uses the code are separate statements, so two
//! concurrent creations can compute the same code. The unique index on
//! `invoices.code` rejects the loser and invoice creation retries.

use crate::services::{InvoiceStore, StoreError};
use chrono::NaiveDate;

/// Date prefix shared by every code issued on `date`.
pub fn date_prefix(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Code for the invoice after `existing` invoices on `date`.
pub fn code_for(date: NaiveDate, existing: i64) -> String {
    format!("{}{}", date_prefix(date), existing + 1)
}

/// Next code for `date` based on what is already stored.
pub async fn next_code(store: &dyn InvoiceStore, date: NaiveDate) -> Result<String, StoreError> {
    let existing = store.count_codes_for_date(&date_prefix(date)).await?;
    Ok(code_for(date, existing))
}

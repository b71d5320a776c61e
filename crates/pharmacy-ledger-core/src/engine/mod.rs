//! Stock engine: pure transformations over a medicine's batch log.
//!
//! Pipeline per operation: Ledger load → engine transform → Ledger save.
//! Nothing in this module performs I/O; callers hand it an in-memory copy.

mod discard;
mod receive;
mod reports;
mod sell;

pub use discard::*;
pub use receive::*;
pub use reports::*;
pub use sell::*;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::models::Medicine;

/// Stock engine errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid quantity: {0} (must be positive)")]
    InvalidQuantity(i64),

    #[error("Invalid date: {0}")]
    InvalidDates(String),

    #[error("Invalid unit price: {0}")]
    InvalidPrice(f64),

    #[error("Barcode {barcode} already belongs to {existing}")]
    BarcodeConflict { barcode: String, existing: String },

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    #[error("Quantity overflow: {on_hand} on hand, {received} received")]
    QuantityOverflow { on_hand: u64, received: u64 },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Recompute the derived fields of a medicine from its batches.
///
/// - `quantity`: sum over non-discarded batches
/// - `earliest_expiry`: minimum expiry over all batches
/// - `average_manufacture_date`: mean manufacture date over all batches
pub fn recompute(medicine: &mut Medicine) {
    medicine.quantity = medicine
        .batches
        .iter()
        .filter(|b| b.is_sellable())
        .map(|b| b.quantity)
        .fold(0, u64::saturating_add);

    medicine.earliest_expiry = medicine.batches.iter().map(|b| b.expiry_date).min();
    medicine.average_manufacture_date = average_date(medicine.batches.iter().map(|b| b.manufacture_date));
}

/// Arithmetic mean of timestamps at millisecond precision.
fn average_date(dates: impl Iterator<Item = DateTime<Utc>>) -> Option<DateTime<Utc>> {
    let (sum, count) = dates.fold((0i128, 0i128), |(sum, count), d| {
        (sum + d.timestamp_millis() as i128, count + 1)
    });
    if count == 0 {
        return None;
    }
    DateTime::from_timestamp_millis((sum / count) as i64)
}

/// Parse a stock date: RFC 3339 timestamp or a YYYY-MM-DD calendar date (midnight UTC).
pub fn parse_stock_date(raw: &str) -> EngineResult<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| EngineError::InvalidDates(raw.to_string()))
}

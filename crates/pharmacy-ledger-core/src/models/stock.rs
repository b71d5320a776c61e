//! Stock movement request and result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stock-in request as received from the request layer.
///
/// Dates are kept as raw strings; the engine parses them and rejects
/// anything it cannot read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockIn {
    /// Units received, must be positive
    pub quantity: i64,
    /// RFC 3339 timestamp or YYYY-MM-DD
    pub expiry_date: String,
    /// RFC 3339 timestamp or YYYY-MM-DD
    pub manufacture_date: String,
}

impl StockIn {
    pub fn new(quantity: i64, expiry_date: impl Into<String>, manufacture_date: impl Into<String>) -> Self {
        Self {
            quantity,
            expiry_date: expiry_date.into(),
            manufacture_date: manufacture_date.into(),
        }
    }
}

/// Units taken from one batch to fulfil a sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleLine {
    pub batch_id: String,
    pub expiry_date: DateTime<Utc>,
    pub quantity: u64,
    pub unit_price: f64,
    pub line_total: f64,
}

/// Outcome of a successful sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleReceipt {
    pub barcode: String,
    pub medicine_name: String,
    /// Lines in allocation (FEFO) order
    pub lines: Vec<SaleLine>,
    pub total_quantity: u64,
    pub total_amount: f64,
}

impl SaleReceipt {
    /// Build a receipt, deriving the totals from the lines.
    pub fn new(barcode: String, medicine_name: String, lines: Vec<SaleLine>) -> Self {
        let total_quantity = lines.iter().map(|l| l.quantity).sum();
        let total_amount = lines.iter().map(|l| l.line_total).sum();
        Self {
            barcode,
            medicine_name,
            lines,
            total_quantity,
            total_amount,
        }
    }
}

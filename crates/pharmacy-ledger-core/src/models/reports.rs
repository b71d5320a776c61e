//! Read-only inventory reports.

use serde::{Deserialize, Serialize};

use super::Medicine;

/// Aggregate figures over an organization's inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockSummary {
    /// Number of medicines in the inventory
    pub total_items: u64,
    /// Sellable units across all medicines
    pub total_quantity: u64,
    /// Medicines whose earliest non-discarded batch expires within the window
    pub nearing_expiry: u64,
}

/// Medicines whose sellable quantity is at or below a threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LowStockReport {
    pub items: Vec<Medicine>,
    pub threshold: u64,
    pub count: u64,
}

//! Inventory reports computed from a loaded medicine list.

use chrono::{DateTime, Duration, Utc};

use crate::models::{LowStockReport, Medicine, StockSummary};

/// Days ahead of `now` that count as nearing expiry.
pub const NEAR_EXPIRY_DAYS: i64 = 30;

/// Threshold used when the caller does not supply one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u64 = 10;

/// Summarize an inventory as of `now`.
///
/// Discarded batches never count toward nearing expiry, even when they are
/// the earliest to expire.
pub fn stock_summary(medicines: &[Medicine], now: DateTime<Utc>) -> StockSummary {
    let horizon = now + Duration::days(NEAR_EXPIRY_DAYS);

    let nearing_expiry = medicines
        .iter()
        .filter(|m| {
            m.batches
                .iter()
                .filter(|b| b.is_sellable())
                .map(|b| b.expiry_date)
                .min()
                .is_some_and(|earliest| earliest <= horizon)
        })
        .count();

    StockSummary {
        total_items: medicines.len() as u64,
        total_quantity: medicines
            .iter()
            .fold(0, |total, m| total.saturating_add(m.quantity)),
        nearing_expiry: nearing_expiry as u64,
    }
}

/// List medicines with at most `threshold` sellable units, in inventory order.
///
/// A missing threshold defaults to [`DEFAULT_LOW_STOCK_THRESHOLD`]; zero is
/// raised to one.
pub fn low_stock(medicines: &[Medicine], threshold: Option<u64>) -> LowStockReport {
    let threshold = threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD).max(1);
    let items: Vec<Medicine> = medicines
        .iter()
        .filter(|m| m.quantity <= threshold)
        .cloned()
        .collect();

    LowStockReport {
        count: items.len() as u64,
        items,
        threshold,
    }
}

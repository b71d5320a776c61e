//! Stock-in: append received units to a medicine's batch log.

use chrono::{DateTime, Utc};

use super::{parse_stock_date, recompute, EngineError, EngineResult};
use crate::models::{Batch, Medicine, MedicineInfo, StockIn};

/// Receive stock for a barcode.
///
/// `existing` is the organization's current medicine for this barcode, if any.
/// `info` is only used when the barcode has never been stocked. The caller is
/// responsible for checking that `existing` really belongs to `info.name`.
///
/// Only the tail batch is eligible for merging: if its (expiry, manufacture)
/// pair equals the incoming one its quantity grows, otherwise a new batch is
/// appended.
pub fn receive(
    existing: Option<Medicine>,
    barcode: &str,
    info: &MedicineInfo,
    stock: &StockIn,
    now: DateTime<Utc>,
) -> EngineResult<Medicine> {
    let quantity = validate_quantity(stock.quantity)?;
    let expiry_date = parse_stock_date(&stock.expiry_date)?;
    let manufacture_date = parse_stock_date(&stock.manufacture_date)?;

    let mut medicine = match existing {
        Some(medicine) => medicine,
        None => {
            validate_price(info.unit_price)?;
            Medicine::new(barcode, info.clone(), now)
        }
    };

    // Sellable total must stay representable after the merge
    let on_hand = sellable_total(&medicine);
    let overflow = || EngineError::QuantityOverflow { on_hand, received: quantity };
    on_hand.checked_add(quantity).ok_or_else(overflow)?;

    match medicine.batches.last_mut() {
        Some(tail) if tail.has_dates(expiry_date, manufacture_date) => {
            tail.quantity = tail.quantity.checked_add(quantity).ok_or_else(overflow)?;
        }
        _ => medicine
            .batches
            .push(Batch::new(quantity, expiry_date, manufacture_date)),
    }

    medicine.recently_stocked_at = now;
    recompute(&mut medicine);
    Ok(medicine)
}

fn sellable_total(medicine: &Medicine) -> u64 {
    medicine
        .batches
        .iter()
        .filter(|b| b.is_sellable())
        .fold(0, |total, b| total.saturating_add(b.quantity))
}

fn validate_quantity(quantity: i64) -> EngineResult<u64> {
    if quantity <= 0 {
        return Err(EngineError::InvalidQuantity(quantity));
    }
    Ok(quantity as u64)
}

fn validate_price(price: f64) -> EngineResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(EngineError::InvalidPrice(price));
    }
    Ok(())
}

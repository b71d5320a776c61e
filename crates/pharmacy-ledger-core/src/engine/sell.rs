//! FEFO (first-expire-first-out) sale allocation.

use super::{recompute, EngineError, EngineResult};
use crate::models::{Medicine, SaleLine, SaleReceipt};

/// Plan which batches a sale of `requested` units would debit.
///
/// Sellable batches are ordered by expiry, ties broken by batch id. Fails
/// with `InsufficientStock` when they cannot cover the request. Does not
/// touch the medicine.
pub fn plan_fefo(medicine: &Medicine, requested: u64) -> EngineResult<Vec<SaleLine>> {
    let mut candidates: Vec<_> = medicine
        .batches
        .iter()
        .filter(|b| b.is_sellable() && b.quantity > 0)
        .collect();
    candidates.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then_with(|| a.batch_id.cmp(&b.batch_id))
    });

    let mut remaining = requested;
    let mut lines = Vec::new();
    for batch in candidates {
        if remaining == 0 {
            break;
        }
        let take = batch.quantity.min(remaining);
        remaining -= take;
        lines.push(SaleLine {
            batch_id: batch.batch_id.clone(),
            expiry_date: batch.expiry_date,
            quantity: take,
            unit_price: medicine.unit_price,
            line_total: take as f64 * medicine.unit_price,
        });
    }

    if remaining > 0 {
        return Err(EngineError::InsufficientStock {
            requested,
            available: requested - remaining,
        });
    }
    Ok(lines)
}

/// Sell units of a medicine, consuming the soonest-to-expire stock first.
///
/// Either every planned debit is applied or, on error, the medicine is left
/// untouched.
pub fn sell(medicine: &mut Medicine, requested: i64) -> EngineResult<SaleReceipt> {
    if requested <= 0 {
        return Err(EngineError::InvalidQuantity(requested));
    }
    let lines = plan_fefo(medicine, requested as u64)?;

    for line in &lines {
        if let Some(batch) = medicine
            .batches
            .iter_mut()
            .find(|b| b.batch_id == line.batch_id)
        {
            batch.quantity -= line.quantity;
        }
    }
    recompute(medicine);

    Ok(SaleReceipt::new(
        medicine.barcode.clone(),
        medicine.name.clone(),
        lines,
    ))
}

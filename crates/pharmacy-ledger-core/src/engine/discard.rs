//! Discarding batches, manually or by expiry.

use chrono::{DateTime, Utc};

use super::{recompute, EngineError, EngineResult};
use crate::models::Medicine;

/// Mark a batch as discarded. Its quantity is kept as unsellable stock.
///
/// Returns `true` if the batch transitioned, `false` if it was already
/// discarded.
pub fn discard(medicine: &mut Medicine, batch_id: &str) -> EngineResult<bool> {
    let batch = medicine
        .batches
        .iter_mut()
        .find(|b| b.batch_id == batch_id)
        .ok_or_else(|| EngineError::BatchNotFound(batch_id.to_string()))?;

    let transitioned = !batch.discarded;
    batch.discarded = true;
    recompute(medicine);
    Ok(transitioned)
}

/// Discard every active batch whose expiry is at or before `now`.
///
/// Returns the number of batches that transitioned.
pub fn expire_batches(medicine: &mut Medicine, now: DateTime<Utc>) -> usize {
    let mut expired = 0;
    for batch in medicine.batches.iter_mut() {
        if batch.is_sellable() && batch.is_expired_at(now) {
            batch.discarded = true;
            expired += 1;
        }
    }
    recompute(medicine);
    expired
}

/// Run [`expire_batches`] over a whole medicine list.
pub fn expire_inventory(medicines: &mut [Medicine], now: DateTime<Utc>) -> usize {
    medicines
        .iter_mut()
        .map(|m| expire_batches(m, now))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_discard_freezes_quantity() {
        let mut med = medicine();
        med.batches.push(batch("a", 10, date(2026, 1, 1), date(2025, 1, 1)));
        med.batches.push(batch("b", 4, date(2026, 2, 1), date(2025, 1, 1)));
        recompute(&mut med);

        assert!(discard(&mut med, "a").unwrap());
        assert_eq!(med.batch("a").unwrap().quantity, 10);
        assert!(med.batch("a").unwrap().discarded);
        assert_eq!(med.quantity, 4);
    }

    #[test]
    fn test_discard_idempotent() {
        let mut med = medicine();
        med.batches.push(batch("a", 10, date(2026, 1, 1), date(2025, 1, 1)));
        recompute(&mut med);

        discard(&mut med, "a").unwrap();
        let once = med.clone();
        assert!(!discard(&mut med, "a").unwrap());
        assert_eq!(med, once);
    }

    #[test]
    fn test_discard_unknown_batch() {
        let mut med = medicine();
        assert_eq!(
            discard(&mut med, "missing"),
            Err(EngineError::BatchNotFound("missing".into()))
        );
    }

    #[test]
    fn test_expire_batches() {
        let mut med = medicine();
        med.batches.push(batch("past", 10, date(2025, 5, 31), date(2024, 1, 1)));
        med.batches.push(batch("today", 2, date(2025, 6, 1), date(2024, 1, 1)));
        med.batches.push(batch("future", 3, date(2025, 6, 2), date(2024, 1, 1)));
        recompute(&mut med);
        assert_eq!(med.quantity, 15);

        let now = date(2025, 6, 1);
        assert_eq!(expire_batches(&mut med, now), 2);
        assert_eq!(med.quantity, 3);
        assert_eq!(med.batch("past").unwrap().quantity, 10);

        // Second pass is a no-op
        assert_eq!(expire_batches(&mut med, now), 0);
        assert_eq!(med.quantity, 3);
    }

    #[test]
    fn test_expire_skips_already_discarded() {
        let mut med = medicine();
        let mut gone = batch("gone", 1, date(2025, 1, 1), date(2024, 1, 1));
        gone.discarded = true;
        med.batches.push(gone);

        assert_eq!(expire_inventory(std::slice::from_mut(&mut med), date(2025, 6, 1)), 0);
    }
}

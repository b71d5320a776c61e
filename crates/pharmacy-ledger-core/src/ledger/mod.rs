//! Inventory ledger: role check → load → stock engine → save.
//!
//! Every operation runs as one load-mutate-save cycle over the whole
//! organization inventory. A revision conflict on save restarts the cycle
//! from a fresh load, up to `max_conflict_retries` extra attempts.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::db::{Database, DbError};
use crate::engine::{self, EngineError};
use crate::models::{
    Capability, LowStockReport, Medicine, MedicineInfo, OrgRole, OrganizationInventory,
    SaleReceipt, StockIn, StockSummary,
};

/// Ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Role {role} may not {capability}")]
    Forbidden { role: OrgRole, capability: Capability },

    #[error("User {user_id} is not a member of {org_id}")]
    NotAMember { org_id: String, user_id: String },

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("Medicine not found: {0}")]
    MedicineNotFound(String),

    #[error("Gave up after {attempts} conflicting attempts")]
    RetriesExhausted { attempts: u32 },
}

impl LedgerError {
    /// Transient failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Database(e) => e.is_conflict(),
            LedgerError::RetriesExhausted { .. } => true,
            _ => false,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result of a mutation closure: the value to return and whether the
/// inventory needs saving.
struct Applied<T> {
    value: T,
    dirty: bool,
}

impl<T> Applied<T> {
    fn changed(value: T) -> Self {
        Self { value, dirty: true }
    }

    fn unchanged(value: T) -> Self {
        Self { value, dirty: false }
    }
}

/// Organization-scoped inventory operations.
pub struct InventoryLedger<'a> {
    db: &'a Database,
    max_conflict_retries: u32,
}

impl<'a> InventoryLedger<'a> {
    /// Create a ledger over a database using the configured retry bound.
    pub fn new(db: &'a Database, config: &LedgerConfig) -> Self {
        Self::with_retries(db, config.max_conflict_retries)
    }

    pub fn with_retries(db: &'a Database, max_conflict_retries: u32) -> Self {
        Self {
            db,
            max_conflict_retries,
        }
    }

    /// Resolve the acting user's role within an organization.
    pub fn role_of(&self, org_id: &str, user_id: &str) -> LedgerResult<OrgRole> {
        if self.db.get_organization(org_id)?.is_none() {
            return Err(LedgerError::OrganizationNotFound(org_id.to_string()));
        }
        self.db
            .get_member_role(org_id, user_id)?
            .ok_or_else(|| LedgerError::NotAMember {
                org_id: org_id.to_string(),
                user_id: user_id.to_string(),
            })
    }

    /// Receive stock for a barcode, creating the medicine on first receipt.
    pub fn stock_in(
        &self,
        role: OrgRole,
        org_id: &str,
        barcode: &str,
        info: &MedicineInfo,
        stock: &StockIn,
    ) -> LedgerResult<Medicine> {
        authorize(role, Capability::StockIn)?;
        let medicine = self.transact(org_id, "stock_in", |inventory| {
            let now = Utc::now();
            let position = inventory.medicines.iter().position(|m| m.barcode == barcode);

            if let Some(existing) = position.map(|i| &inventory.medicines[i]) {
                if existing.name != info.name {
                    return Err(EngineError::BarcodeConflict {
                        barcode: barcode.to_string(),
                        existing: existing.name.clone(),
                    }
                    .into());
                }
            }

            let existing = position.map(|i| inventory.medicines[i].clone());
            let updated = engine::receive(existing, barcode, info, stock, now)?;
            match position {
                Some(i) => inventory.medicines[i] = updated.clone(),
                None => inventory.medicines.push(updated.clone()),
            }
            Ok(Applied::changed(updated))
        })?;

        info!(
            org_id,
            barcode,
            received = stock.quantity,
            quantity = medicine.quantity,
            batches = medicine.batches.len(),
            "stock received"
        );
        Ok(medicine)
    }

    /// Sell units of a medicine under FEFO allocation.
    pub fn sell(
        &self,
        role: OrgRole,
        org_id: &str,
        barcode: &str,
        quantity: i64,
    ) -> LedgerResult<SaleReceipt> {
        authorize(role, Capability::Sell)?;
        let receipt = self.transact(org_id, "sell", |inventory| {
            let medicine = inventory
                .find_by_barcode_mut(barcode)
                .ok_or_else(|| LedgerError::MedicineNotFound(barcode.to_string()))?;
            let receipt = engine::sell(medicine, quantity)?;
            Ok(Applied::changed(receipt))
        })?;

        info!(
            org_id,
            barcode,
            sold = receipt.total_quantity,
            batches = receipt.lines.len(),
            "sale recorded"
        );
        Ok(receipt)
    }

    /// Discard a batch by id, wherever it lives in the organization.
    pub fn discard_batch(&self, role: OrgRole, org_id: &str, batch_id: &str) -> LedgerResult<Medicine> {
        authorize(role, Capability::DiscardBatch)?;
        let medicine = self.transact(org_id, "discard_batch", |inventory| {
            let medicine = inventory
                .find_by_batch_mut(batch_id)
                .ok_or_else(|| EngineError::BatchNotFound(batch_id.to_string()))?;
            let transitioned = engine::discard(medicine, batch_id)?;
            let snapshot = medicine.clone();
            Ok(if transitioned {
                Applied::changed(snapshot)
            } else {
                Applied::unchanged(snapshot)
            })
        })?;

        info!(org_id, batch_id, barcode = %medicine.barcode, "batch discarded");
        Ok(medicine)
    }

    /// Discard every expired batch of one organization now.
    pub fn mark_expired(&self, role: OrgRole, org_id: &str) -> LedgerResult<usize> {
        authorize(role, Capability::MarkExpired)?;
        self.expire_organization(org_id, Utc::now())
    }

    /// Discard every batch of one organization expired as of `now`.
    ///
    /// Returns the number of batches that transitioned; nothing is saved when
    /// that number is zero.
    pub fn expire_organization(&self, org_id: &str, now: DateTime<Utc>) -> LedgerResult<usize> {
        let expired = self.transact(org_id, "expire", |inventory| {
            let expired = engine::expire_inventory(&mut inventory.medicines, now);
            Ok(if expired > 0 {
                Applied::changed(expired)
            } else {
                Applied::unchanged(expired)
            })
        })?;

        if expired > 0 {
            info!(org_id, expired, "expired batches discarded");
        }
        Ok(expired)
    }

    /// Look up a medicine by barcode.
    pub fn medicine_by_barcode(&self, role: OrgRole, org_id: &str, barcode: &str) -> LedgerResult<Medicine> {
        authorize(role, Capability::ViewInventory)?;
        self.load(org_id)?
            .find_by_barcode(barcode)
            .cloned()
            .ok_or_else(|| LedgerError::MedicineNotFound(barcode.to_string()))
    }

    /// All medicines of an organization in catalog order.
    pub fn list_inventory(&self, role: OrgRole, org_id: &str) -> LedgerResult<Vec<Medicine>> {
        authorize(role, Capability::ViewInventory)?;
        Ok(self.load(org_id)?.medicines)
    }

    /// Item count, sellable units and medicines nearing expiry as of `now`.
    pub fn stock_summary(
        &self,
        role: OrgRole,
        org_id: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<StockSummary> {
        authorize(role, Capability::ViewInventory)?;
        Ok(engine::stock_summary(&self.load(org_id)?.medicines, now))
    }

    /// Medicines at or below `threshold` sellable units.
    pub fn low_stock(
        &self,
        role: OrgRole,
        org_id: &str,
        threshold: Option<u64>,
    ) -> LedgerResult<LowStockReport> {
        authorize(role, Capability::ViewInventory)?;
        Ok(engine::low_stock(&self.load(org_id)?.medicines, threshold))
    }

    fn load(&self, org_id: &str) -> LedgerResult<OrganizationInventory> {
        self.db.load_inventory(org_id).map_err(|e| match e {
            DbError::NotFound(_) => LedgerError::OrganizationNotFound(org_id.to_string()),
            other => other.into(),
        })
    }

    /// Run one serializable load → mutate → save cycle, retrying on conflict.
    fn transact<T, F>(&self, org_id: &str, operation: &'static str, mut mutate: F) -> LedgerResult<T>
    where
        F: FnMut(&mut OrganizationInventory) -> LedgerResult<Applied<T>>,
    {
        let attempts = self.max_conflict_retries + 1;
        for attempt in 1..=attempts {
            let mut inventory = self.load(org_id)?;
            debug!(org_id, operation, attempt, revision = inventory.revision, "inventory loaded");

            let applied = mutate(&mut inventory)?;
            if !applied.dirty {
                return Ok(applied.value);
            }

            match self.db.save_inventory(&mut inventory) {
                Ok(revision) => {
                    debug!(org_id, operation, revision, "inventory saved");
                    return Ok(applied.value);
                }
                Err(e) if e.is_conflict() => {
                    warn!(org_id, operation, attempt, "revision conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::RetriesExhausted { attempts })
    }
}

fn authorize(role: OrgRole, capability: Capability) -> LedgerResult<()> {
    if role.allows(capability) {
        Ok(())
    } else {
        Err(LedgerError::Forbidden { role, capability })
    }
}

//! Pharmacy Ledger Core Library
//!
//! Inventory batch ledger for pharmacy organizations: time-dated batches,
//! FEFO sales, manual discards and periodic expiry sweeps.
//!
//! # Architecture
//!
//! ```text
//!   Caller (role + org id)
//!          │
//!          ▼
//!   ┌──────────────┐  load   ┌──────────────────┐
//!   │   Ledger     │◄───────►│  SQLite document │
//!   │ (role check, │  save   │  per organization│
//!   │  retry loop) │  (CAS)  │  + revision      │
//!   └──────┬───────┘         └──────────────────┘
//!          │ in-memory copy
//!          ▼
//!   ┌──────────────┐
//!   │ Stock Engine │  recompute · receive · sell (FEFO) · discard · expire · reports
//!   └──────────────┘
//!
//!   Scheduler ──► ExpirySweeper::sweep(now) ──► ExpiryNotifier
//! ```
//!
//! # Core Principle
//!
//! **A sale either debits every planned batch or none.** Derived quantity and
//! dates are always recomputed from the batch log, never set directly.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence with optimistic revisions
//! - [`models`]: Domain types (Medicine, Batch, OrgRole, etc.)
//! - [`engine`]: Pure stock computations
//! - [`ledger`]: Load-mutate-save orchestration with role checks
//! - [`sweeper`]: Expiry sweep across organizations
//! - [`config`]: Environment configuration
//! - [`observability`]: Tracing setup

pub mod config;
pub mod db;
pub mod engine;
pub mod ledger;
pub mod models;
pub mod observability;
pub mod sweeper;

// Re-export commonly used types
pub use config::LedgerConfig;
pub use db::Database;
pub use engine::EngineError;
pub use ledger::{InventoryLedger, LedgerError};
pub use models::{
    Batch, Capability, LowStockReport, Medicine, MedicineInfo, MedicineType, OrgRole,
    Organization, OrganizationInventory, SaleLine, SaleReceipt, StockIn, StockSummary,
};
pub use sweeper::{ExpiryNotifier, ExpirySweeper, SweepReport, SweepSummary};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PharmacyLedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rejected: {0}")]
    BusinessRule(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for PharmacyLedgerError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(_) => PharmacyLedgerError::NotFound(e.to_string()),
            db::DbError::Conflict { .. } => PharmacyLedgerError::Conflict(e.to_string()),
            other => PharmacyLedgerError::DatabaseError(other.to_string()),
        }
    }
}

impl From<EngineError> for PharmacyLedgerError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::InvalidQuantity(_)
            | EngineError::InvalidDates(_)
            | EngineError::InvalidPrice(_)
            | EngineError::QuantityOverflow { .. } => PharmacyLedgerError::InvalidInput(e.to_string()),
            EngineError::BatchNotFound(_) => PharmacyLedgerError::NotFound(e.to_string()),
            EngineError::BarcodeConflict { .. } | EngineError::InsufficientStock { .. } => {
                PharmacyLedgerError::BusinessRule(e.to_string())
            }
        }
    }
}

impl From<LedgerError> for PharmacyLedgerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Engine(inner) => inner.into(),
            LedgerError::Database(inner) => inner.into(),
            LedgerError::Forbidden { .. } | LedgerError::NotAMember { .. } => {
                PharmacyLedgerError::Forbidden(e.to_string())
            }
            LedgerError::OrganizationNotFound(_) | LedgerError::MedicineNotFound(_) => {
                PharmacyLedgerError::NotFound(e.to_string())
            }
            LedgerError::RetriesExhausted { .. } => PharmacyLedgerError::Conflict(e.to_string()),
        }
    }
}

impl From<sweeper::SweepError> for PharmacyLedgerError {
    fn from(e: sweeper::SweepError) -> Self {
        match e {
            sweeper::SweepError::Database(inner) => inner.into(),
            sweeper::SweepError::Ledger(inner) => inner.into(),
        }
    }
}

impl From<config::ConfigError> for PharmacyLedgerError {
    fn from(e: config::ConfigError) -> Self {
        PharmacyLedgerError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PharmacyLedgerError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PharmacyLedgerError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a ledger database at the given path.
#[uniffi::export]
pub fn open_ledger(path: String) -> Result<Arc<PharmacyLedger>, PharmacyLedgerError> {
    let db = Database::open(&path)?;
    Ok(PharmacyLedger::wrap(db, LedgerConfig::default()))
}

/// Create an in-memory ledger (for testing).
#[uniffi::export]
pub fn open_ledger_in_memory() -> Result<Arc<PharmacyLedger>, PharmacyLedgerError> {
    let db = Database::open_in_memory()?;
    Ok(PharmacyLedger::wrap(db, LedgerConfig::default()))
}

/// Open the ledger described by the environment and install logging.
#[uniffi::export]
pub fn open_ledger_from_env() -> Result<Arc<PharmacyLedger>, PharmacyLedgerError> {
    let config = LedgerConfig::from_env()?;
    observability::init(&config.log_filter);
    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    tracing::info!(path = ?config.database_path, "ledger opened");
    Ok(PharmacyLedger::wrap(db, config))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe ledger wrapper for FFI.
///
/// Calls on one handle are serialized by the mutex; separate handles on the
/// same file are kept consistent by inventory revisions.
#[derive(uniffi::Object)]
pub struct PharmacyLedger {
    db: Arc<Mutex<Database>>,
    config: LedgerConfig,
}

impl PharmacyLedger {
    fn wrap(db: Database, config: LedgerConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }
}

#[uniffi::export]
impl PharmacyLedger {
    // =========================================================================
    // Organization Operations
    // =========================================================================

    /// Create an organization with an empty inventory.
    pub fn create_organization(&self, name: String) -> Result<FfiOrganization, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let org = Organization::new(name);
        db.insert_organization(&org)?;
        Ok(org.into())
    }

    /// Add a member or change their role.
    pub fn set_member_role(
        &self,
        org_id: String,
        user_id: String,
        role: String,
    ) -> Result<(), PharmacyLedgerError> {
        let role: OrgRole = role.parse().map_err(PharmacyLedgerError::InvalidInput)?;
        let db = self.db.lock()?;
        db.upsert_member(&org_id, &user_id, role)?;
        Ok(())
    }

    // =========================================================================
    // Inventory Operations
    // =========================================================================

    /// Receive stock for a barcode.
    pub fn stock_in(
        &self,
        user_id: String,
        org_id: String,
        barcode: String,
        info: FfiMedicineInfo,
        stock: FfiStockIn,
    ) -> Result<FfiMedicine, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        let info = MedicineInfo::try_from(info)?;
        let medicine = ledger.stock_in(role, &org_id, &barcode, &info, &stock.into())?;
        Ok(medicine.into())
    }

    /// Sell units of a medicine (FEFO).
    pub fn sell(
        &self,
        user_id: String,
        org_id: String,
        barcode: String,
        quantity: i64,
    ) -> Result<FfiSaleReceipt, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        let receipt = ledger.sell(role, &org_id, &barcode, quantity)?;
        Ok(receipt.into())
    }

    /// Discard a batch by ID.
    pub fn discard_batch(
        &self,
        user_id: String,
        org_id: String,
        batch_id: String,
    ) -> Result<FfiMedicine, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        let medicine = ledger.discard_batch(role, &org_id, &batch_id)?;
        Ok(medicine.into())
    }

    /// Discard every expired batch of one organization now.
    pub fn mark_expired(&self, user_id: String, org_id: String) -> Result<u32, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        Ok(ledger.mark_expired(role, &org_id)? as u32)
    }

    /// Get a medicine by barcode.
    pub fn get_medicine(
        &self,
        user_id: String,
        org_id: String,
        barcode: String,
    ) -> Result<FfiMedicine, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        Ok(ledger.medicine_by_barcode(role, &org_id, &barcode)?.into())
    }

    /// List an organization's inventory.
    pub fn list_inventory(
        &self,
        user_id: String,
        org_id: String,
    ) -> Result<Vec<FfiMedicine>, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        let medicines = ledger.list_inventory(role, &org_id)?;
        Ok(medicines.into_iter().map(|m| m.into()).collect())
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Item count, sellable units and medicines expiring within 30 days.
    pub fn stock_summary(
        &self,
        user_id: String,
        org_id: String,
    ) -> Result<FfiStockSummary, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        Ok(ledger.stock_summary(role, &org_id, Utc::now())?.into())
    }

    /// Medicines at or below `threshold` sellable units (default 10).
    pub fn low_stock(
        &self,
        user_id: String,
        org_id: String,
        threshold: Option<u64>,
    ) -> Result<FfiLowStockReport, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let ledger = InventoryLedger::new(&db, &self.config);
        let role = ledger.role_of(&org_id, &user_id)?;
        Ok(ledger.low_stock(role, &org_id, threshold)?.into())
    }

    // =========================================================================
    // Sweep Operations
    // =========================================================================

    /// Run the expiry sweep over all organizations (invoked by a scheduler).
    pub fn run_expiry_sweep(&self) -> Result<FfiSweepSummary, PharmacyLedgerError> {
        let db = self.db.lock()?;
        let sweeper = ExpirySweeper::new(&db, InventoryLedger::new(&db, &self.config));
        let summary = sweeper.sweep(Utc::now())?;
        Ok(summary.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe organization.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOrganization {
    pub org_id: String,
    pub name: String,
}

impl From<Organization> for FfiOrganization {
    fn from(org: Organization) -> Self {
        Self {
            org_id: org.org_id,
            name: org.name,
        }
    }
}

/// FFI-safe catalog attributes.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicineInfo {
    pub name: String,
    pub medicine_type: String,
    pub unit_price: f64,
    pub description: Option<String>,
    pub special_instructions: Option<String>,
    pub handling_temperature: Option<f64>,
}

impl TryFrom<FfiMedicineInfo> for MedicineInfo {
    type Error = PharmacyLedgerError;

    fn try_from(info: FfiMedicineInfo) -> Result<Self, Self::Error> {
        Ok(MedicineInfo {
            name: info.name,
            medicine_type: info
                .medicine_type
                .parse()
                .map_err(PharmacyLedgerError::InvalidInput)?,
            unit_price: info.unit_price,
            description: info.description,
            special_instructions: info.special_instructions,
            handling_temperature: info.handling_temperature,
        })
    }
}

/// FFI-safe stock-in request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStockIn {
    pub quantity: i64,
    pub expiry_date: String,
    pub manufacture_date: String,
}

impl From<FfiStockIn> for StockIn {
    fn from(stock: FfiStockIn) -> Self {
        StockIn {
            quantity: stock.quantity,
            expiry_date: stock.expiry_date,
            manufacture_date: stock.manufacture_date,
        }
    }
}

/// FFI-safe batch.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBatch {
    pub batch_id: String,
    pub quantity: u64,
    pub expiry_date: String,
    pub manufacture_date: String,
    pub discarded: bool,
}

impl From<Batch> for FfiBatch {
    fn from(batch: Batch) -> Self {
        Self {
            batch_id: batch.batch_id,
            quantity: batch.quantity,
            expiry_date: batch.expiry_date.to_rfc3339(),
            manufacture_date: batch.manufacture_date.to_rfc3339(),
            discarded: batch.discarded,
        }
    }
}

/// FFI-safe medicine.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicine {
    pub id: String,
    pub barcode: String,
    pub name: String,
    pub medicine_type: String,
    pub unit_price: f64,
    pub description: Option<String>,
    pub special_instructions: Option<String>,
    pub handling_temperature: Option<f64>,
    pub quantity: u64,
    pub earliest_expiry: Option<String>,
    pub average_manufacture_date: Option<String>,
    pub batches: Vec<FfiBatch>,
    pub first_stocked_at: String,
    pub recently_stocked_at: String,
}

impl From<Medicine> for FfiMedicine {
    fn from(med: Medicine) -> Self {
        Self {
            id: med.id,
            barcode: med.barcode,
            name: med.name,
            medicine_type: med.medicine_type.to_string(),
            unit_price: med.unit_price,
            description: med.description,
            special_instructions: med.special_instructions,
            handling_temperature: med.handling_temperature,
            quantity: med.quantity,
            earliest_expiry: med.earliest_expiry.map(rfc3339),
            average_manufacture_date: med.average_manufacture_date.map(rfc3339),
            batches: med.batches.into_iter().map(|b| b.into()).collect(),
            first_stocked_at: med.first_stocked_at.to_rfc3339(),
            recently_stocked_at: med.recently_stocked_at.to_rfc3339(),
        }
    }
}

/// FFI-safe sale line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSaleLine {
    pub batch_id: String,
    pub expiry_date: String,
    pub quantity: u64,
    pub unit_price: f64,
    pub line_total: f64,
}

/// FFI-safe sale receipt.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSaleReceipt {
    pub barcode: String,
    pub medicine_name: String,
    pub lines: Vec<FfiSaleLine>,
    pub total_quantity: u64,
    pub total_amount: f64,
}

impl From<SaleReceipt> for FfiSaleReceipt {
    fn from(receipt: SaleReceipt) -> Self {
        Self {
            barcode: receipt.barcode,
            medicine_name: receipt.medicine_name,
            lines: receipt
                .lines
                .into_iter()
                .map(|l| FfiSaleLine {
                    batch_id: l.batch_id,
                    expiry_date: l.expiry_date.to_rfc3339(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    line_total: l.line_total,
                })
                .collect(),
            total_quantity: receipt.total_quantity,
            total_amount: receipt.total_amount,
        }
    }
}

/// FFI-safe sweep report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSweepReport {
    pub org_id: String,
    pub org_name: String,
    pub discarded_batches: u32,
    pub recipients: Vec<String>,
}

/// FFI-safe stock summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStockSummary {
    pub total_items: u64,
    pub total_quantity: u64,
    pub nearing_expiry: u64,
}

impl From<StockSummary> for FfiStockSummary {
    fn from(summary: StockSummary) -> Self {
        Self {
            total_items: summary.total_items,
            total_quantity: summary.total_quantity,
            nearing_expiry: summary.nearing_expiry,
        }
    }
}

/// FFI-safe low stock report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLowStockReport {
    pub items: Vec<FfiMedicine>,
    pub threshold: u64,
    pub count: u64,
}

impl From<LowStockReport> for FfiLowStockReport {
    fn from(report: LowStockReport) -> Self {
        Self {
            items: report.items.into_iter().map(|m| m.into()).collect(),
            threshold: report.threshold,
            count: report.count,
        }
    }
}

/// FFI-safe sweep summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSweepSummary {
    pub reports: Vec<FfiSweepReport>,
    pub failed_org_ids: Vec<String>,
}

impl From<SweepSummary> for FfiSweepSummary {
    fn from(summary: SweepSummary) -> Self {
        Self {
            reports: summary
                .reports
                .into_iter()
                .map(|r| FfiSweepReport {
                    org_id: r.org_id,
                    org_name: r.org_name,
                    discarded_batches: r.discarded_batches as u32,
                    recipients: r.recipients,
                })
                .collect(),
            failed_org_ids: summary.failures.into_iter().map(|f| f.org_id).collect(),
        }
    }
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

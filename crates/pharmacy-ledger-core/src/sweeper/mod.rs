//! Expiry sweeper: periodic pass that discards expired batches in every
//! organization.
//!
//! The scheduler itself lives outside this crate; it only needs to call
//! [`ExpirySweeper::sweep`] with the current instant and hand the resulting
//! reports to an [`ExpiryNotifier`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::{Database, DbError};
use crate::ledger::{InventoryLedger, LedgerError};
use crate::models::Organization;

/// Sweep errors.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type SweepResult<T> = Result<T, SweepError>;

/// Notification delivery failure.
#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// An organization that had batches discarded during a sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepReport {
    pub org_id: String,
    pub org_name: String,
    /// Batches that went from active to discarded in this pass
    pub discarded_batches: usize,
    /// Admins and inventory managers to alert
    pub recipients: Vec<String>,
    pub swept_at: DateTime<Utc>,
}

impl SweepReport {
    /// Notification title and body.
    pub fn message(&self) -> (String, String) {
        (
            "Expired Batches Marked".to_string(),
            format!(
                "{} batch(es) were auto-marked expired in {}",
                self.discarded_batches, self.org_name
            ),
        )
    }
}

/// An organization whose sweep could not be committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepFailure {
    pub org_id: String,
    pub error: String,
}

/// Outcome of one pass over all organizations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SweepSummary {
    pub reports: Vec<SweepReport>,
    pub failures: Vec<SweepFailure>,
    /// Set when the pass stopped early
    pub cancelled: bool,
}

impl SweepSummary {
    /// IDs of organizations with at least one newly discarded batch.
    pub fn organizations(&self) -> BTreeSet<String> {
        self.reports.iter().map(|r| r.org_id.clone()).collect()
    }

    pub fn discarded_batches(&self) -> usize {
        self.reports.iter().map(|r| r.discarded_batches).sum()
    }
}

/// Delivers expiry alerts to organization managers.
pub trait ExpiryNotifier {
    fn notify(&self, report: &SweepReport) -> Result<(), NotifyError>;
}

/// Runs expiry passes across organizations.
pub struct ExpirySweeper<'a> {
    db: &'a Database,
    ledger: InventoryLedger<'a>,
}

impl<'a> ExpirySweeper<'a> {
    /// Create a new sweeper. Each organization is committed through `ledger`.
    pub fn new(db: &'a Database, ledger: InventoryLedger<'a>) -> Self {
        Self { db, ledger }
    }

    /// Sweep every organization as of `now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepResult<SweepSummary> {
        self.sweep_until(now, &AtomicBool::new(false))
    }

    /// Sweep every organization, checking `cancel` between organizations.
    ///
    /// Organizations already swept stay committed when the pass is cancelled.
    pub fn sweep_until(&self, now: DateTime<Utc>, cancel: &AtomicBool) -> SweepResult<SweepSummary> {
        self.sweep_while(now, || !cancel.load(Ordering::Relaxed))
    }

    fn sweep_while<F>(&self, now: DateTime<Utc>, mut keep_going: F) -> SweepResult<SweepSummary>
    where
        F: FnMut() -> bool,
    {
        let organizations = self.db.list_organizations()?;
        let mut summary = SweepSummary::default();

        for (index, org) in organizations.iter().enumerate() {
            if !keep_going() {
                warn!(remaining = organizations.len() - index, "sweep cancelled");
                summary.cancelled = true;
                break;
            }

            match self.sweep_organization(org, now) {
                Ok(Some(report)) => summary.reports.push(report),
                Ok(None) => {}
                Err(e) => {
                    error!(org_id = %org.org_id, error = %e, "sweep failed for organization");
                    summary.failures.push(SweepFailure {
                        org_id: org.org_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            organizations = organizations.len(),
            affected = summary.reports.len(),
            discarded = summary.discarded_batches(),
            failed = summary.failures.len(),
            "expiry sweep finished"
        );
        Ok(summary)
    }

    /// Sweep one organization. Returns a report only if a batch transitioned.
    pub fn sweep_organization(
        &self,
        org: &Organization,
        now: DateTime<Utc>,
    ) -> SweepResult<Option<SweepReport>> {
        let discarded = self.ledger.expire_organization(&org.org_id, now)?;
        if discarded == 0 {
            return Ok(None);
        }

        Ok(Some(SweepReport {
            org_id: org.org_id.clone(),
            org_name: org.name.clone(),
            discarded_batches: discarded,
            recipients: self.db.list_managers(&org.org_id)?,
            swept_at: now,
        }))
    }
}

/// Hand every report to the notifier. Returns how many were delivered.
///
/// Delivery failures are logged and do not affect the committed sweep.
pub fn notify_managers(summary: &SweepSummary, notifier: &dyn ExpiryNotifier) -> usize {
    let mut delivered = 0;
    for report in &summary.reports {
        if report.recipients.is_empty() {
            continue;
        }
        match notifier.notify(report) {
            Ok(()) => delivered += 1,
            Err(e) => warn!(org_id = %report.org_id, error = %e, "expiry notification failed"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MedicineInfo, MedicineType, OrgRole, StockIn};
    use chrono::TimeZone;
    use std::cell::RefCell;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn stocked_org(db: &Database, name: &str, expiry: &str) -> Organization {
        stock_org(db, Organization::new(name), expiry)
    }

    /// Insert `org` with a manager and one batch of ten units.
    fn stock_org(db: &Database, org: Organization, expiry: &str) -> Organization {
        db.insert_organization(&org).unwrap();
        db.upsert_member(&org.org_id, "owner", OrgRole::Admin).unwrap();
        let ledger = InventoryLedger::with_retries(db, 3);
        ledger
            .stock_in(
                OrgRole::Admin,
                &org.org_id,
                "7001",
                &MedicineInfo::new("Salbutamol", MedicineType::Inhaler, 4.0),
                &StockIn::new(10, expiry, "2024-01-01"),
            )
            .unwrap();
        org
    }

    struct RecordingNotifier {
        sent: RefCell<Vec<String>>,
        fail: bool,
    }

    impl ExpiryNotifier for RecordingNotifier {
        fn notify(&self, report: &SweepReport) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError("smtp down".into()));
            }
            self.sent.borrow_mut().push(report.org_id.clone());
            Ok(())
        }
    }

    #[test]
    fn test_sweep_discards_and_reports() {
        let db = Database::open_in_memory().unwrap();
        let expired = stocked_org(&db, "Old Stock", "2025-05-31");
        let fresh = stocked_org(&db, "Fresh Stock", "2027-01-01");

        let sweeper = ExpirySweeper::new(&db, InventoryLedger::with_retries(&db, 3));
        let summary = sweeper.sweep(date(2025, 6, 1)).unwrap();

        assert_eq!(summary.organizations().into_iter().collect::<Vec<_>>(), vec![expired.org_id.clone()]);
        assert_eq!(summary.reports[0].discarded_batches, 1);
        assert_eq!(summary.reports[0].recipients, vec!["owner"]);
        assert!(!summary.cancelled);

        let inv = db.load_inventory(&expired.org_id).unwrap();
        assert_eq!(inv.medicines[0].quantity, 0);
        assert_eq!(inv.medicines[0].batches[0].quantity, 10);
        assert!(inv.medicines[0].batches[0].discarded);

        assert_eq!(db.load_inventory(&fresh.org_id).unwrap().medicines[0].quantity, 10);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let org = stocked_org(&db, "Old Stock", "2025-05-31");
        let sweeper = ExpirySweeper::new(&db, InventoryLedger::with_retries(&db, 3));

        sweeper.sweep(date(2025, 6, 1)).unwrap();
        let revision = db.inventory_revision(&org.org_id).unwrap();

        let again = sweeper.sweep(date(2025, 6, 1)).unwrap();
        assert!(again.reports.is_empty());
        assert_eq!(db.inventory_revision(&org.org_id).unwrap(), revision);
    }

    #[test]
    fn test_cancelled_before_start() {
        let db = Database::open_in_memory().unwrap();
        let org = stocked_org(&db, "Old Stock", "2025-05-31");
        let sweeper = ExpirySweeper::new(&db, InventoryLedger::with_retries(&db, 3));

        let summary = sweeper.sweep_until(date(2025, 6, 1), &AtomicBool::new(true)).unwrap();
        assert!(summary.cancelled);
        assert!(summary.reports.is_empty());
        assert_eq!(db.load_inventory(&org.org_id).unwrap().medicines[0].quantity, 10);
    }

    fn org_created(name: &str, created_at: &str) -> Organization {
        let mut org = Organization::new(name);
        org.created_at = created_at.to_string();
        org
    }

    fn sellable(db: &Database, org: &Organization) -> u64 {
        db.load_inventory(&org.org_id).unwrap().medicines[0].quantity
    }

    #[test]
    fn test_cancelled_between_organizations() {
        let db = Database::open_in_memory().unwrap();
        let first = stock_org(&db, org_created("North", "2025-01-01T00:00:00+00:00"), "2025-05-31");
        let second = stock_org(&db, org_created("South", "2025-01-02T00:00:00+00:00"), "2025-05-31");
        let sweeper = ExpirySweeper::new(&db, InventoryLedger::with_retries(&db, 3));

        let cancel = AtomicBool::new(false);
        let summary = sweeper
            .sweep_while(date(2025, 6, 1), || {
                // Raise the flag once the first organization has been swept
                let proceed = !cancel.load(Ordering::Relaxed);
                cancel.store(true, Ordering::Relaxed);
                proceed
            })
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.organizations().into_iter().collect::<Vec<_>>(), vec![first.org_id.clone()]);
        assert!(summary.failures.is_empty());
        assert_eq!(sellable(&db, &first), 0);
        assert_eq!(db.inventory_revision(&first.org_id).unwrap(), Some(2));
        assert_eq!(sellable(&db, &second), 10);
        assert_eq!(db.inventory_revision(&second.org_id).unwrap(), Some(1));

        // The next pass picks up where the cancelled one stopped
        let rest = sweeper.sweep(date(2025, 6, 1)).unwrap();
        assert_eq!(rest.organizations().into_iter().collect::<Vec<_>>(), vec![second.org_id.clone()]);
        assert_eq!(sellable(&db, &second), 0);
    }

    #[test]
    fn test_failed_organization_does_not_stop_sweep() {
        let db = Database::open_in_memory().unwrap();
        let broken = stock_org(&db, org_created("Broken", "2025-01-01T00:00:00+00:00"), "2025-05-31");
        let healthy = stock_org(&db, org_created("Healthy", "2025-01-02T00:00:00+00:00"), "2025-05-31");
        db.conn()
            .execute(
                "UPDATE inventories SET medicines = 'not json' WHERE org_id = ?",
                [&broken.org_id],
            )
            .unwrap();

        let sweeper = ExpirySweeper::new(&db, InventoryLedger::with_retries(&db, 3));
        let summary = sweeper.sweep(date(2025, 6, 1)).unwrap();

        assert!(!summary.cancelled);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].org_id, broken.org_id);
        assert_eq!(summary.organizations().into_iter().collect::<Vec<_>>(), vec![healthy.org_id.clone()]);
        assert_eq!(sellable(&db, &healthy), 0);
    }

    #[test]
    fn test_notify_managers() {
        let db = Database::open_in_memory().unwrap();
        let org = stocked_org(&db, "Old Stock", "2025-05-31");
        let sweeper = ExpirySweeper::new(&db, InventoryLedger::with_retries(&db, 3));
        let summary = sweeper.sweep(date(2025, 6, 1)).unwrap();

        let notifier = RecordingNotifier { sent: RefCell::new(Vec::new()), fail: false };
        assert_eq!(notify_managers(&summary, &notifier), 1);
        assert_eq!(*notifier.sent.borrow(), vec![org.org_id]);

        let failing = RecordingNotifier { sent: RefCell::new(Vec::new()), fail: true };
        assert_eq!(notify_managers(&summary, &failing), 0);

        let (title, body) = summary.reports[0].message();
        assert_eq!(title, "Expired Batches Marked");
        assert!(body.contains("Old Stock"));
    }
}

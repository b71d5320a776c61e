//! Inventory document operations with optimistic revisions.

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Medicine, OrganizationInventory};

impl Database {
    /// Load an organization's medicine list together with its revision.
    pub fn load_inventory(&self, org_id: &str) -> DbResult<OrganizationInventory> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT revision, medicines FROM inventories WHERE org_id = ?",
                [org_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (revision, medicines_json) =
            row.ok_or_else(|| DbError::NotFound(format!("inventory for {}", org_id)))?;
        let medicines: Vec<Medicine> = serde_json::from_str(&medicines_json)?;

        Ok(OrganizationInventory {
            org_id: org_id.to_string(),
            revision,
            medicines,
        })
    }

    /// Save a medicine list if nobody else saved since it was loaded.
    ///
    /// The whole list is written in one statement. On success the inventory's
    /// revision is advanced to the stored one; on a stale revision nothing is
    /// written and [`DbError::Conflict`] is returned.
    pub fn save_inventory(&self, inventory: &mut OrganizationInventory) -> DbResult<i64> {
        check_unique_barcodes(&inventory.medicines)?;
        let medicines_json = serde_json::to_string(&inventory.medicines)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE inventories SET
                medicines = ?3,
                revision = revision + 1,
                updated_at = datetime('now')
            WHERE org_id = ?1 AND revision = ?2
            "#,
            params![inventory.org_id, inventory.revision, medicines_json],
        )?;

        if rows_affected == 0 {
            let exists: Option<i64> = self
                .conn
                .query_row(
                    "SELECT revision FROM inventories WHERE org_id = ?",
                    [&inventory.org_id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match exists {
                Some(_) => DbError::Conflict {
                    org_id: inventory.org_id.clone(),
                    expected: inventory.revision,
                },
                None => DbError::NotFound(format!("inventory for {}", inventory.org_id)),
            });
        }

        inventory.revision += 1;
        Ok(inventory.revision)
    }

    /// Current stored revision of an organization's inventory.
    pub fn inventory_revision(&self, org_id: &str) -> DbResult<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT revision FROM inventories WHERE org_id = ?",
                [org_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

fn check_unique_barcodes(medicines: &[Medicine]) -> DbResult<()> {
    let mut seen = HashSet::new();
    for medicine in medicines {
        if !seen.insert(medicine.barcode.as_str()) {
            return Err(DbError::Constraint(format!(
                "duplicate barcode {}",
                medicine.barcode
            )));
        }
    }
    Ok(())
}

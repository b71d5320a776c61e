//! Organization and membership database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{OrgRole, Organization};

impl Database {
    /// Insert a new organization (its empty inventory is created alongside).
    pub fn insert_organization(&self, org: &Organization) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO organizations (org_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![org.org_id, org.name, org.created_at],
        )?;
        Ok(())
    }

    /// Get an organization by ID.
    pub fn get_organization(&self, org_id: &str) -> DbResult<Option<Organization>> {
        Ok(self
            .conn
            .query_row(
                "SELECT org_id, name, created_at FROM organizations WHERE org_id = ?",
                [org_id],
                |row| {
                    Ok(Organization {
                        org_id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// List all organizations, oldest first.
    pub fn list_organizations(&self) -> DbResult<Vec<Organization>> {
        let mut stmt = self
            .conn
            .prepare("SELECT org_id, name, created_at FROM organizations ORDER BY created_at, org_id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Organization {
                org_id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;

        let mut orgs = Vec::new();
        for row in rows {
            orgs.push(row?);
        }
        Ok(orgs)
    }

    /// Add a member or change their role.
    pub fn upsert_member(&self, org_id: &str, user_id: &str, role: OrgRole) -> DbResult<()> {
        if self.get_organization(org_id)?.is_none() {
            return Err(DbError::NotFound(format!("organization {}", org_id)));
        }
        self.conn.execute(
            r#"
            INSERT INTO org_members (org_id, user_id, role) VALUES (?1, ?2, ?3)
            ON CONFLICT(org_id, user_id) DO UPDATE SET role = excluded.role
            "#,
            params![org_id, user_id, role.as_str()],
        )?;
        Ok(())
    }

    /// Remove a member. Returns whether a membership existed.
    pub fn remove_member(&self, org_id: &str, user_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM org_members WHERE org_id = ? AND user_id = ?",
            [org_id, user_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a user's role within an organization.
    pub fn get_member_role(&self, org_id: &str, user_id: &str) -> DbResult<Option<OrgRole>> {
        let role: Option<String> = self
            .conn
            .query_row(
                "SELECT role FROM org_members WHERE org_id = ? AND user_id = ?",
                [org_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        role.map(|r| r.parse::<OrgRole>().map_err(DbError::Constraint))
            .transpose()
    }

    /// User IDs of members who receive inventory alerts (Admin, Inventory Manager).
    pub fn list_managers(&self, org_id: &str) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id FROM org_members
            WHERE org_id = ? AND role IN ('Admin', 'Inventory Manager')
            ORDER BY user_id
            "#,
        )?;
        let rows = stmt.query_map([org_id], |row| row.get(0))?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, Organization) {
        let db = Database::open_in_memory().unwrap();
        let org = Organization::new("Corner Pharmacy");
        db.insert_organization(&org).unwrap();
        (db, org)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, org) = setup();
        let retrieved = db.get_organization(&org.org_id).unwrap().unwrap();
        assert_eq!(retrieved, org);
        assert!(db.get_organization("nope").unwrap().is_none());
    }

    #[test]
    fn test_member_roles() {
        let (db, org) = setup();
        db.upsert_member(&org.org_id, "alice", OrgRole::Salesperson).unwrap();
        assert_eq!(
            db.get_member_role(&org.org_id, "alice").unwrap(),
            Some(OrgRole::Salesperson)
        );

        db.upsert_member(&org.org_id, "alice", OrgRole::InventoryManager).unwrap();
        assert_eq!(
            db.get_member_role(&org.org_id, "alice").unwrap(),
            Some(OrgRole::InventoryManager)
        );

        assert!(db.remove_member(&org.org_id, "alice").unwrap());
        assert_eq!(db.get_member_role(&org.org_id, "alice").unwrap(), None);
    }

    #[test]
    fn test_member_requires_organization() {
        let (db, _) = setup();
        let result = db.upsert_member("missing", "alice", OrgRole::Admin);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_list_managers() {
        let (db, org) = setup();
        db.upsert_member(&org.org_id, "admin", OrgRole::Admin).unwrap();
        db.upsert_member(&org.org_id, "manager", OrgRole::InventoryManager).unwrap();
        db.upsert_member(&org.org_id, "seller", OrgRole::Salesperson).unwrap();
        db.upsert_member(&org.org_id, "receiver", OrgRole::InventoryIn).unwrap();

        assert_eq!(db.list_managers(&org.org_id).unwrap(), vec!["admin", "manager"]);
    }
}

//! SQLite schema definition.

/// Complete database schema for the pharmacy ledger.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Organizations
-- ============================================================================

CREATE TABLE IF NOT EXISTS organizations (
    org_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS org_members (
    org_id TEXT NOT NULL REFERENCES organizations(org_id),
    user_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('Admin', 'Inventory In', 'Inventory Manager', 'Salesperson')),
    added_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (org_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_members_role ON org_members(org_id, role);

-- ============================================================================
-- Inventory (one document per organization, compare-and-swap on revision)
-- ============================================================================

CREATE TABLE IF NOT EXISTS inventories (
    org_id TEXT PRIMARY KEY REFERENCES organizations(org_id),
    revision INTEGER NOT NULL DEFAULT 0,
    medicines TEXT NOT NULL DEFAULT '[]',         -- JSON array of Medicine
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Every organization starts with an empty inventory at revision 0
CREATE TRIGGER IF NOT EXISTS organizations_ai AFTER INSERT ON organizations BEGIN
    INSERT INTO inventories (org_id) VALUES (new.org_id);
END;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_inventory_created_with_organization() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO organizations (org_id, name) VALUES (?, ?)",
            ["org-1", "Corner Pharmacy"],
        )
        .unwrap();

        let (revision, medicines): (i64, String) = conn
            .query_row(
                "SELECT revision, medicines FROM inventories WHERE org_id = 'org-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(revision, 0);
        assert_eq!(medicines, "[]");
    }

    #[test]
    fn test_role_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO organizations (org_id, name) VALUES ('org-1', 'Corner Pharmacy')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO org_members (org_id, user_id, role) VALUES ('org-1', 'u1', 'Pharmacist')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO org_members (org_id, user_id, role) VALUES ('org-1', 'u1', 'Inventory Manager')",
            [],
        );
        assert!(result.is_ok());
    }
}

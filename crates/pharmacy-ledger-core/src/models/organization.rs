//! Organization, membership role and inventory document models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::medicine::Medicine;

/// Role of a member within an organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrgRole {
    Admin,
    InventoryIn,
    InventoryManager,
    Salesperson,
}

/// An operation on the ledger that requires a role check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewInventory,
    StockIn,
    Sell,
    DiscardBatch,
    MarkExpired,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Admin => "Admin",
            OrgRole::InventoryIn => "Inventory In",
            OrgRole::InventoryManager => "Inventory Manager",
            OrgRole::Salesperson => "Salesperson",
        }
    }

    /// Check whether this role may perform an operation.
    ///
    /// Admin can do everything; every member can view the inventory.
    pub fn allows(&self, capability: Capability) -> bool {
        match (self, capability) {
            (OrgRole::Admin, _) => true,
            (_, Capability::ViewInventory) => true,
            (OrgRole::InventoryIn, Capability::StockIn) => true,
            (OrgRole::Salesperson, Capability::Sell) => true,
            (OrgRole::InventoryManager, Capability::DiscardBatch | Capability::MarkExpired) => true,
            _ => false,
        }
    }

    /// Whether members with this role receive expiry notifications.
    pub fn is_manager(&self) -> bool {
        matches!(self, OrgRole::Admin | OrgRole::InventoryManager)
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        match key.to_lowercase().as_str() {
            "admin" => Ok(OrgRole::Admin),
            "inventoryin" => Ok(OrgRole::InventoryIn),
            "inventorymanager" => Ok(OrgRole::InventoryManager),
            "salesperson" => Ok(OrgRole::Salesperson),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ViewInventory => "view inventory",
            Capability::StockIn => "stock in",
            Capability::Sell => "sell",
            Capability::DiscardBatch => "discard batch",
            Capability::MarkExpired => "mark expired batches",
        };
        f.write_str(name)
    }
}

/// An organization record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub org_id: String,
    pub name: String,
    pub created_at: String,
}

impl Organization {
    /// Create a new organization with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            org_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// The whole medicine list of one organization, as loaded from the store.
///
/// `revision` is the store version this copy was read at; saving a copy whose
/// revision is stale fails with a conflict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrganizationInventory {
    pub org_id: String,
    pub revision: i64,
    pub medicines: Vec<Medicine>,
}

impl OrganizationInventory {
    /// Empty inventory at revision 0.
    pub fn empty(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            revision: 0,
            medicines: Vec::new(),
        }
    }

    pub fn find_by_barcode(&self, barcode: &str) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.barcode == barcode)
    }

    pub fn find_by_barcode_mut(&mut self, barcode: &str) -> Option<&mut Medicine> {
        self.medicines.iter_mut().find(|m| m.barcode == barcode)
    }

    /// Find the medicine holding a batch.
    pub fn find_by_batch_mut(&mut self, batch_id: &str) -> Option<&mut Medicine> {
        self.medicines.iter_mut().find(|m| m.has_batch(batch_id))
    }

    /// Total sellable units across all medicines.
    pub fn total_quantity(&self) -> u64 {
        self.medicines.iter().map(|m| m.quantity).sum()
    }
}

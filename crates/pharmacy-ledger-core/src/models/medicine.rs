//! Medicine and batch models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dosage form of a medicine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MedicineType {
    Tablet,
    Capsule,
    Injection,
    Syrup,
    Powder,
    Tube,
    Spray,
    Inhaler,
}

impl MedicineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicineType::Tablet => "Tablet",
            MedicineType::Capsule => "Capsule",
            MedicineType::Injection => "Injection",
            MedicineType::Syrup => "Syrup",
            MedicineType::Powder => "Powder",
            MedicineType::Tube => "Tube",
            MedicineType::Spray => "Spray",
            MedicineType::Inhaler => "Inhaler",
        }
    }
}

impl fmt::Display for MedicineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MedicineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tablet" => Ok(MedicineType::Tablet),
            "capsule" => Ok(MedicineType::Capsule),
            "injection" => Ok(MedicineType::Injection),
            "syrup" => Ok(MedicineType::Syrup),
            "powder" => Ok(MedicineType::Powder),
            "tube" => Ok(MedicineType::Tube),
            "spray" => Ok(MedicineType::Spray),
            "inhaler" => Ok(MedicineType::Inhaler),
            other => Err(format!("unknown medicine type: {}", other)),
        }
    }
}

/// A received lot of one medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Batch {
    /// Opaque identifier, immutable once created
    pub batch_id: String,
    /// Units currently in this batch (frozen once discarded)
    pub quantity: u64,
    /// Date after which the batch is unsellable
    pub expiry_date: DateTime<Utc>,
    /// Date the batch was produced
    pub manufacture_date: DateTime<Utc>,
    /// Once true, never reverts
    pub discarded: bool,
}

impl Batch {
    /// Create a fresh, active batch with a new id.
    pub fn new(quantity: u64, expiry_date: DateTime<Utc>, manufacture_date: DateTime<Utc>) -> Self {
        Self {
            batch_id: uuid::Uuid::new_v4().to_string(),
            quantity,
            expiry_date,
            manufacture_date,
            discarded: false,
        }
    }

    /// Whether this batch can be allocated to a sale.
    pub fn is_sellable(&self) -> bool {
        !self.discarded
    }

    /// Whether the batch has reached its expiry as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }

    /// Whether the batch was received with exactly these dates.
    pub fn has_dates(&self, expiry_date: DateTime<Utc>, manufacture_date: DateTime<Utc>) -> bool {
        self.expiry_date == expiry_date && self.manufacture_date == manufacture_date
    }
}

/// Catalog attributes supplied when a barcode is stocked for the first time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicineInfo {
    /// Display name (must match the existing medicine for this barcode)
    pub name: String,
    /// Dosage form
    pub medicine_type: MedicineType,
    /// Price per unit, non-negative
    pub unit_price: f64,
    pub description: Option<String>,
    pub special_instructions: Option<String>,
    /// Storage temperature in degrees Celsius
    pub handling_temperature: Option<f64>,
}

impl MedicineInfo {
    /// Create catalog attributes with required fields.
    pub fn new(name: impl Into<String>, medicine_type: MedicineType, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            medicine_type,
            unit_price,
            description: None,
            special_instructions: None,
            handling_temperature: None,
        }
    }
}

/// One catalog entry of an organization, identified by barcode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    /// Internal identifier
    pub id: String,
    /// Barcode, unique within the organization
    pub barcode: String,
    pub name: String,
    pub medicine_type: MedicineType,
    pub unit_price: f64,
    pub description: Option<String>,
    pub special_instructions: Option<String>,
    pub handling_temperature: Option<f64>,
    /// Sellable units (derived)
    pub quantity: u64,
    /// Earliest expiry over all batches (derived)
    pub earliest_expiry: Option<DateTime<Utc>>,
    /// Mean manufacture date over all batches (derived)
    pub average_manufacture_date: Option<DateTime<Utc>>,
    /// Receipt-ordered batch log
    pub batches: Vec<Batch>,
    /// First-ever receipt, immutable
    pub first_stocked_at: DateTime<Utc>,
    /// Most recent receipt
    pub recently_stocked_at: DateTime<Utc>,
}

impl Medicine {
    /// Create an empty medicine for a barcode that has never been stocked.
    pub fn new(barcode: impl Into<String>, info: MedicineInfo, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            barcode: barcode.into(),
            name: info.name,
            medicine_type: info.medicine_type,
            unit_price: info.unit_price,
            description: info.description,
            special_instructions: info.special_instructions,
            handling_temperature: info.handling_temperature,
            quantity: 0,
            earliest_expiry: None,
            average_manufacture_date: None,
            batches: Vec::new(),
            first_stocked_at: now,
            recently_stocked_at: now,
        }
    }

    /// Look up a batch by id.
    pub fn batch(&self, batch_id: &str) -> Option<&Batch> {
        self.batches.iter().find(|b| b.batch_id == batch_id)
    }

    /// Check if any batch carries this id.
    pub fn has_batch(&self, batch_id: &str) -> bool {
        self.batch(batch_id).is_some()
    }

    /// Count of batches still available for sale.
    pub fn active_batch_count(&self) -> usize {
        self.batches.iter().filter(|b| b.is_sellable()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_medicine_type_parse() {
        assert_eq!("Tablet".parse::<MedicineType>().unwrap(), MedicineType::Tablet);
        assert_eq!(" syrup ".parse::<MedicineType>().unwrap(), MedicineType::Syrup);
        assert!("lozenge".parse::<MedicineType>().is_err());
        assert_eq!(MedicineType::Inhaler.to_string(), "Inhaler");
    }

    #[test]
    fn test_new_medicine_is_empty() {
        let now = date(2025, 1, 1);
        let med = Medicine::new("8901", MedicineInfo::new("Paracetamol", MedicineType::Tablet, 2.5), now);

        assert_eq!(med.quantity, 0);
        assert!(med.batches.is_empty());
        assert_eq!(med.earliest_expiry, None);
        assert_eq!(med.first_stocked_at, now);
        assert_eq!(med.recently_stocked_at, now);
    }

    #[test]
    fn test_batch_expiry_is_inclusive() {
        let batch = Batch::new(5, date(2025, 6, 1), date(2024, 6, 1));
        assert!(!batch.is_expired_at(date(2025, 5, 31)));
        assert!(batch.is_expired_at(date(2025, 6, 1)));
        assert!(batch.is_sellable());
    }

    #[test]
    fn test_batch_ids_are_unique() {
        let a = Batch::new(1, date(2025, 6, 1), date(2024, 6, 1));
        let b = Batch::new(1, date(2025, 6, 1), date(2024, 6, 1));
        assert_ne!(a.batch_id, b.batch_id);
        assert!(a.has_dates(b.expiry_date, b.manufacture_date));
    }
}

//! Medication catalog contract, in-memory implementation, and the
//! built-in default medications.

use crate::{Error, Medication, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Storage abstraction for medication records
pub trait MedicationCatalog: Send + Sync {
    fn find(&self, code: &str) -> Result<Option<Medication>>;

    /// Add a medication, failing if the code is taken
    fn insert(&self, medication: Medication) -> Result<()>;

    /// Every medication, ordered by code
    fn list(&self) -> Result<Vec<Medication>>;
}

/// Catalog held in memory
#[derive(Default)]
pub struct InMemoryMedicationCatalog {
    medications: RwLock<BTreeMap<String, Medication>>,
}

impl InMemoryMedicationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_medications(medications: impl IntoIterator<Item = Medication>) -> Result<Self> {
        let catalog = Self::new();
        for medication in medications {
            catalog.insert(medication)?;
        }
        Ok(catalog)
    }

    /// Catalog seeded with [`default_medications`]
    pub fn with_defaults() -> Self {
        let medications = default_medications()
            .iter()
            .map(|m| (m.code.clone(), m.clone()))
            .collect();
        Self {
            medications: RwLock::new(medications),
        }
    }
}

impl MedicationCatalog for InMemoryMedicationCatalog {
    fn find(&self, code: &str) -> Result<Option<Medication>> {
        Ok(self.medications.read().get(code).cloned())
    }

    fn insert(&self, medication: Medication) -> Result<()> {
        let mut medications = self.medications.write();
        if medications.contains_key(&medication.code) {
            return Err(Error::MedicationAlreadyExists(medication.code));
        }
        medications.insert(medication.code.clone(), medication);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Medication>> {
        Ok(self.medications.read().values().cloned().collect())
    }
}

/// Cached default medications - built once and reused
static DEFAULT_MEDICATIONS: Lazy<Vec<Medication>> = Lazy::new(|| {
    vec![
        Medication::new("MED_1", "Paracetamol", 200),
        Medication::new("MED_2", "Ibuprofen", 150),
        Medication::new("MED_3", "Amoxicillin", 350),
        Medication::new("MED_4", "Insulin", 50),
        Medication::new("MED_5", "Epinephrine", 480),
    ]
});

/// Built-in medications used to seed a fresh data directory
pub fn default_medications() -> &'static [Medication] {
    &DEFAULT_MEDICATIONS
}

//! Error types for the fleet_core library.

use crate::State;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classes that callers can branch on without matching
/// every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Drone or medication absent
    NotFound,
    /// Identifier already registered
    Conflict,
    /// Load attempted on a non-idle drone
    InvalidState,
    /// Battery below threshold or medication too heavy
    PolicyViolation,
    /// Active drone without log history, or an unmapped active state
    InternalInconsistency,
    /// Malformed input rejected before touching storage
    InvalidInput,
    /// Persistence or configuration failure
    Storage,
}

/// Core error type for fleet_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Drone not found: {0}")]
    DroneNotFound(String),

    #[error("Medication not found: {0}")]
    MedicationNotFound(String),

    #[error("Drone already exists: {0}")]
    DroneAlreadyExists(String),

    #[error("Medication already exists: {0}")]
    MedicationAlreadyExists(String),

    /// Drone must be idle to accept a load
    #[error("Drone {number} is in state {state}, expected idle")]
    IllegalDroneState { number: String, state: State },

    #[error("Drone {number} battery {battery}% is below threshold {threshold}%")]
    LowBatteryCapacity {
        number: String,
        battery: u8,
        threshold: u8,
    },

    #[error("Medication weight {weight} exceeds drone {number} weight limit {weight_limit}")]
    IllegalMedicationWeight {
        number: String,
        weight_limit: u32,
        weight: u32,
    },

    /// Data that the state machine can never produce on its own
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DroneNotFound(_) | Error::MedicationNotFound(_) => ErrorKind::NotFound,
            Error::DroneAlreadyExists(_) | Error::MedicationAlreadyExists(_) => ErrorKind::Conflict,
            Error::IllegalDroneState { .. } => ErrorKind::InvalidState,
            Error::LowBatteryCapacity { .. } | Error::IllegalMedicationWeight { .. } => {
                ErrorKind::PolicyViolation
            }
            Error::InternalInconsistency(_) => ErrorKind::InternalInconsistency,
            Error::Validation(_) => ErrorKind::InvalidInput,
            Error::Io(_)
            | Error::Json(_)
            | Error::Csv(_)
            | Error::Toml(_)
            | Error::Config(_)
            | Error::Other(_) => ErrorKind::Storage,
        }
    }
}

//! Core domain types for the drone fleet.
//!
//! This module defines the fundamental types used throughout the system:
//! - Drones, their models and lifecycle states
//! - Medications
//! - Event log entries and per-drone aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a drone serial number
pub const MAX_DRONE_NUMBER_LEN: usize = 100;

/// Heaviest weight limit a drone can be registered with
pub const MAX_WEIGHT_LIMIT: u32 = 500;

/// Full battery
pub const FULL_BATTERY: u8 = 100;

// ============================================================================
// Drone Types
// ============================================================================

/// Drone model category
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Lightweight,
    Middleweight,
    Cruiserweight,
    Heavyweight,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Lightweight => "lightweight",
            ModelType::Middleweight => "middleweight",
            ModelType::Cruiserweight => "cruiserweight",
            ModelType::Heavyweight => "heavyweight",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "lightweight" => Ok(ModelType::Lightweight),
            "middleweight" => Ok(ModelType::Middleweight),
            "cruiserweight" => Ok(ModelType::Cruiserweight),
            "heavyweight" => Ok(ModelType::Heavyweight),
            other => Err(crate::Error::Validation(format!("unknown model type: {}", other))),
        }
    }
}

/// Drone lifecycle state
///
/// `Idle` is the only resting state. Every other state is active: the
/// battery drains each tick and the periodic engine moves the drone along
/// the configured transition path until it is idle again.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Idle,
    Loading,
    Loaded,
    Delivering,
    Delivering1,
    Delivering2,
    Delivering3,
    Delivered,
    Returning,
    Returning1,
    Returning2,
    Returning3,
}

impl State {
    pub const ALL: [State; 12] = [
        State::Idle,
        State::Loading,
        State::Loaded,
        State::Delivering,
        State::Delivering1,
        State::Delivering2,
        State::Delivering3,
        State::Delivered,
        State::Returning,
        State::Returning1,
        State::Returning2,
        State::Returning3,
    ];

    pub fn is_idle(&self) -> bool {
        *self == State::Idle
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Loading => "loading",
            State::Loaded => "loaded",
            State::Delivering => "delivering",
            State::Delivering1 => "delivering1",
            State::Delivering2 => "delivering2",
            State::Delivering3 => "delivering3",
            State::Delivered => "delivered",
            State::Returning => "returning",
            State::Returning1 => "returning1",
            State::Returning2 => "returning2",
            State::Returning3 => "returning3",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let lower = s.to_lowercase();
        State::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == lower)
            .ok_or_else(|| crate::Error::Validation(format!("unknown drone state: {}", s)))
    }
}

/// A registered drone
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Drone {
    pub number: String,
    pub model: ModelType,
    pub weight_limit: u32,
    pub battery_capacity: u8,
    pub state: State,
}

/// Registration request for a new drone
///
/// The state is not part of the request: new drones always start idle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DroneSpec {
    pub number: String,
    pub model: ModelType,
    pub weight_limit: u32,
    pub battery_capacity: u8,
}

impl DroneSpec {
    /// Collect every validation rule these fields break
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.number.trim().is_empty() {
            errors.push("drone number must not be empty".to_string());
        }
        if self.number.chars().count() > MAX_DRONE_NUMBER_LEN {
            errors.push(format!(
                "drone number must be at most {} characters",
                MAX_DRONE_NUMBER_LEN
            ));
        }
        if self.weight_limit == 0 || self.weight_limit > MAX_WEIGHT_LIMIT {
            errors.push(format!(
                "weight limit must be in 1..={}, got {}",
                MAX_WEIGHT_LIMIT, self.weight_limit
            ));
        }
        if self.battery_capacity > FULL_BATTERY {
            errors.push(format!(
                "battery capacity must be in 0..={}, got {}",
                FULL_BATTERY, self.battery_capacity
            ));
        }
        errors
    }

    pub fn into_drone(self) -> Drone {
        Drone {
            number: self.number,
            model: self.model,
            weight_limit: self.weight_limit,
            battery_capacity: self.battery_capacity,
            state: State::Idle,
        }
    }
}

// ============================================================================
// Medication Types
// ============================================================================

/// A medication that drones can carry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medication {
    pub code: String,
    pub name: String,
    pub weight: u32,
}

impl Medication {
    pub fn new(code: impl Into<String>, name: impl Into<String>, weight: u32) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            weight,
        }
    }

    /// Collect every rule the medication breaks
    ///
    /// Codes are upper-case letters, digits and underscores; names are
    /// letters, digits, `-` and `_`.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let code_ok = !self.code.is_empty()
            && self
                .code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if !code_ok {
            errors.push(format!("invalid medication code: {:?}", self.code));
        }
        let name_ok = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !name_ok {
            errors.push(format!("invalid medication name: {:?}", self.name));
        }
        if self.weight == 0 {
            errors.push("medication weight must be positive".to_string());
        }
        errors
    }
}

// ============================================================================
// Event Log Types
// ============================================================================

/// An immutable audit record of a drone at a point in time
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventLog {
    pub id: u64,
    pub drone_number: String,
    pub medication_code: String,
    pub timestamp: DateTime<Utc>,
    pub state: State,
    pub battery_capacity: u8,
}

/// A log entry waiting for the store to assign its id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEventLog {
    pub drone_number: String,
    pub medication_code: String,
    pub timestamp: DateTime<Utc>,
    pub state: State,
    pub battery_capacity: u8,
}

impl NewEventLog {
    /// Snapshot of `drone` carrying `medication_code`
    pub fn for_drone(drone: &Drone, medication_code: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            drone_number: drone.number.clone(),
            medication_code: medication_code.to_string(),
            timestamp,
            state: drone.state,
            battery_capacity: drone.battery_capacity,
        }
    }

    pub fn with_id(self, id: u64) -> EventLog {
        EventLog {
            id,
            drone_number: self.drone_number,
            medication_code: self.medication_code,
            timestamp: self.timestamp,
            state: self.state,
            battery_capacity: self.battery_capacity,
        }
    }
}

/// Number of loading log entries recorded for a drone
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DroneMedicationsAmount {
    pub number: String,
    pub amount: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DroneSpec {
        DroneSpec {
            number: "Drone-1".into(),
            model: ModelType::Middleweight,
            weight_limit: 300,
            battery_capacity: 80,
        }
    }

    #[test]
    fn test_valid_spec_becomes_idle_drone() {
        let spec = spec();
        assert!(spec.validate().is_empty());
        let drone = spec.into_drone();
        assert_eq!(drone.state, State::Idle);
        assert_eq!(drone.battery_capacity, 80);
    }

    #[test]
    fn test_spec_rejects_out_of_range_fields() {
        let mut spec = spec();
        spec.number = String::new();
        spec.weight_limit = 501;
        spec.battery_capacity = 101;
        assert_eq!(spec.validate().len(), 3);
    }

    #[test]
    fn test_medication_code_must_be_upper_case() {
        assert!(Medication::new("MED_1", "Aspirin", 10).validate().is_empty());
        assert_eq!(Medication::new("med-1", "Aspirin", 10).validate().len(), 1);
        assert_eq!(Medication::new("MED_2", "two words", 0).validate().len(), 2);
    }

    #[test]
    fn test_state_parses_case_insensitively() {
        assert_eq!("RETURNING3".parse::<State>().unwrap(), State::Returning3);
        assert!("flying".parse::<State>().is_err());
        assert!(State::Idle.is_idle());
        assert!(!State::Loaded.is_idle());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&State::Delivering2).unwrap();
        assert_eq!(json, "\"delivering2\"");
    }
}

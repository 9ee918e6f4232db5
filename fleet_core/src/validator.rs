//! Load command validation.
//!
//! Loading is the only way into the active cycle. The checks run in a
//! fixed order and the first failure wins:
//! 1. the drone exists
//! 2. the medication exists
//! 3. the drone is idle
//! 4. the battery is at or above the threshold
//! 5. the medication fits the drone's weight limit
//!
//! Checks 3-5 and the state change run under the drone's lock together
//! with the first log append, so a concurrent tick cannot slip in between.

use crate::catalog::MedicationCatalog;
use crate::event_log::EventLogStore;
use crate::registry::DroneRegistry;
use crate::{Error, EventLog, NewEventLog, Result, State};
use chrono::Utc;
use std::sync::Arc;

pub struct LoadValidator<R, M, L> {
    registry: Arc<R>,
    catalog: Arc<M>,
    logs: Arc<L>,
    capacity_threshold: u8,
    loading_state: State,
}

impl<R, M, L> LoadValidator<R, M, L>
where
    R: DroneRegistry,
    M: MedicationCatalog,
    L: EventLogStore,
{
    pub fn new(
        registry: Arc<R>,
        catalog: Arc<M>,
        logs: Arc<L>,
        capacity_threshold: u8,
        loading_state: State,
    ) -> Self {
        Self {
            registry,
            catalog,
            logs,
            capacity_threshold,
            loading_state,
        }
    }

    /// Load a medication onto an idle drone and write the first log entry
    /// of its delivery cycle
    pub fn load_drone(&self, drone_number: &str, medication_code: &str) -> Result<EventLog> {
        tracing::debug!(
            "received: drone_number={}, medication_code={}",
            drone_number,
            medication_code
        );

        if !self.registry.exists(drone_number)? {
            return Err(Error::DroneNotFound(drone_number.to_string()));
        }
        let medication = self
            .catalog
            .find(medication_code)?
            .ok_or_else(|| Error::MedicationNotFound(medication_code.to_string()))?;
        tracing::debug!("found medication: {:?}", medication);

        let threshold = self.capacity_threshold;
        let loading_state = self.loading_state;
        let logs = &self.logs;

        let log = self.registry.with_drone_mut(drone_number, |drone| {
            if drone.state != State::Idle {
                return Err(Error::IllegalDroneState {
                    number: drone.number.clone(),
                    state: drone.state,
                });
            }
            if drone.battery_capacity < threshold {
                return Err(Error::LowBatteryCapacity {
                    number: drone.number.clone(),
                    battery: drone.battery_capacity,
                    threshold,
                });
            }
            if drone.weight_limit < medication.weight {
                return Err(Error::IllegalMedicationWeight {
                    number: drone.number.clone(),
                    weight_limit: drone.weight_limit,
                    weight: medication.weight,
                });
            }

            drone.state = loading_state;
            logs.append(NewEventLog::for_drone(drone, &medication.code, Utc::now()))
        })?;

        tracing::debug!("saved log: {:?}", log);
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryMedicationCatalog;
    use crate::event_log::InMemoryEventLogStore;
    use crate::registry::InMemoryDroneRegistry;
    use crate::{Drone, ErrorKind, Medication, ModelType};

    type TestValidator =
        LoadValidator<InMemoryDroneRegistry, InMemoryMedicationCatalog, InMemoryEventLogStore>;

    fn setup(
        battery: u8,
        weight_limit: u32,
        state: State,
    ) -> (
        TestValidator,
        Arc<InMemoryDroneRegistry>,
        Arc<InMemoryEventLogStore>,
    ) {
        let registry = Arc::new(InMemoryDroneRegistry::new());
        registry
            .create(Drone {
                number: "D1".into(),
                model: ModelType::Middleweight,
                weight_limit,
                battery_capacity: battery,
                state,
            })
            .unwrap();
        let catalog = Arc::new(
            InMemoryMedicationCatalog::from_medications(vec![
                Medication::new("LIGHT", "Light", 50),
                Medication::new("HEAVY", "Heavy", 400),
            ])
            .unwrap(),
        );
        let logs = Arc::new(InMemoryEventLogStore::new());
        let validator = LoadValidator::new(
            Arc::clone(&registry),
            catalog,
            Arc::clone(&logs),
            25,
            State::Loading,
        );
        (validator, registry, logs)
    }

    #[test]
    fn test_successful_load_writes_first_log() {
        let (validator, registry, logs) = setup(100, 300, State::Idle);
        let log = validator.load_drone("D1", "LIGHT").unwrap();

        assert_eq!(log.state, State::Loading);
        assert_eq!(log.battery_capacity, 100);
        assert_eq!(log.medication_code, "LIGHT");
        assert_eq!(registry.find("D1").unwrap().unwrap().state, State::Loading);
        assert_eq!(logs.all().unwrap(), vec![log]);
    }

    #[test]
    fn test_unknown_drone_checked_before_medication() {
        let (validator, _, _) = setup(100, 300, State::Idle);
        let err = validator.load_drone("D404", "NOPE").unwrap_err();
        assert!(matches!(err, Error::DroneNotFound(_)));

        let err = validator.load_drone("D1", "NOPE").unwrap_err();
        assert!(matches!(err, Error::MedicationNotFound(_)));
    }

    #[test]
    fn test_busy_drone_rejected() {
        let (validator, _, logs) = setup(100, 300, State::Delivering);
        let err = validator.load_drone("D1", "LIGHT").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(logs.all().unwrap().is_empty());
    }

    #[test]
    fn test_low_battery_rejected_even_when_light() {
        let (validator, registry, _) = setup(24, 300, State::Idle);
        let err = validator.load_drone("D1", "LIGHT").unwrap_err();
        assert!(matches!(err, Error::LowBatteryCapacity { battery: 24, threshold: 25, .. }));
        assert_eq!(registry.find("D1").unwrap().unwrap().state, State::Idle);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (validator, _, _) = setup(25, 300, State::Idle);
        assert!(validator.load_drone("D1", "LIGHT").is_ok());
    }

    #[test]
    fn test_heavy_medication_rejected_even_when_charged() {
        let (validator, registry, logs) = setup(100, 300, State::Idle);
        let err = validator.load_drone("D1", "HEAVY").unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalMedicationWeight {
                weight: 400,
                weight_limit: 300,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
        assert_eq!(registry.find("D1").unwrap().unwrap().state, State::Idle);
        assert!(logs.all().unwrap().is_empty());
    }
}

//! Read-only fleet reporting over the registry, catalog and event log.

use crate::catalog::MedicationCatalog;
use crate::event_log::EventLogStore;
use crate::registry::DroneRegistry;
use crate::{Drone, DroneMedicationsAmount, Error, EventLog, Medication, Result, State};
use std::sync::Arc;

pub struct AggregationReader<R, M, L> {
    registry: Arc<R>,
    catalog: Arc<M>,
    logs: Arc<L>,
    capacity_threshold: u8,
    loading_state: State,
}

impl<R, M, L> AggregationReader<R, M, L>
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

    fn require_drone(&self, drone_number: &str) -> Result<()> {
        if self.registry.exists(drone_number)? {
            Ok(())
        } else {
            Err(Error::DroneNotFound(drone_number.to_string()))
        }
    }

    /// Idle drones charged enough to accept a load
    pub fn check_available_drones(&self) -> Result<Vec<Drone>> {
        let drones: Vec<_> = self
            .registry
            .list()?
            .into_iter()
            .filter(|d| d.state.is_idle() && d.battery_capacity >= self.capacity_threshold)
            .collect();
        tracing::trace!("found {} available drones", drones.len());
        Ok(drones)
    }

    pub fn check_battery_level(&self, drone_number: &str) -> Result<u8> {
        tracing::debug!("received drone number: {}", drone_number);
        self.registry
            .find(drone_number)?
            .map(|d| d.battery_capacity)
            .ok_or_else(|| Error::DroneNotFound(drone_number.to_string()))
    }

    /// Every log entry of a drone, newest first
    pub fn check_logs(&self, drone_number: &str) -> Result<Vec<EventLog>> {
        self.require_drone(drone_number)?;
        self.logs.find_by_drone(drone_number)
    }

    /// Medications referenced by the drone's loading entries, one per entry
    pub fn check_medication_items(&self, drone_number: &str) -> Result<Vec<Medication>> {
        tracing::debug!("received drone number {}", drone_number);
        self.require_drone(drone_number)?;

        let logs = self
            .logs
            .find_by_drone_and_state(drone_number, self.loading_state)?;
        tracing::trace!("found {} loading logs", logs.len());

        logs.iter()
            .map(|log| {
                self.catalog.find(&log.medication_code)?.ok_or_else(|| {
                    Error::InternalInconsistency(format!(
                        "log {} references unknown medication {}",
                        log.id, log.medication_code
                    ))
                })
            })
            .collect()
    }

    /// Loading entry count for every drone, largest first
    ///
    /// Drones without loading entries report zero. Equal counts keep
    /// drone-number order.
    pub fn check_drones_medication_items_amounts(&self) -> Result<Vec<DroneMedicationsAmount>> {
        let counts = self.logs.count_by_state(self.loading_state)?;
        let mut amounts: Vec<_> = self
            .registry
            .list()?
            .into_iter()
            .map(|d| DroneMedicationsAmount {
                amount: counts.get(&d.number).copied().unwrap_or(0),
                number: d.number,
            })
            .collect();
        // Stable sort keeps registry order among ties
        amounts.sort_by(|a, b| b.amount.cmp(&a.amount));
        Ok(amounts)
    }
}

//! Drone registry contract and in-memory implementation.
//!
//! Each drone record is guarded by its own lock. Read-modify-write work on
//! a drone goes through [`DroneRegistry::with_drone_mut`], which holds that
//! drone's lock for the whole closure, so a tick step and a load command on
//! the same drone serialize while different drones proceed in parallel.

use crate::{Drone, Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage abstraction for drone records
pub trait DroneRegistry: Send + Sync {
    /// Insert a new drone, failing if the number is taken
    fn create(&self, drone: Drone) -> Result<()>;

    fn find(&self, number: &str) -> Result<Option<Drone>>;

    fn exists(&self, number: &str) -> Result<bool> {
        Ok(self.find(number)?.is_some())
    }

    /// Every drone, ordered by number
    fn list(&self) -> Result<Vec<Drone>>;

    /// Atomically read and update one drone
    ///
    /// The closure works on a copy; the copy replaces the stored record
    /// only if the closure returns `Ok`. Fails with `DroneNotFound` when
    /// the number is unknown.
    fn with_drone_mut<T, F>(&self, number: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Drone) -> Result<T>;
}

/// Registry backed by a map of individually locked records
#[derive(Default)]
pub struct InMemoryDroneRegistry {
    drones: RwLock<BTreeMap<String, Arc<Mutex<Drone>>>>,
}

impl InMemoryDroneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from previously persisted records
    pub fn from_drones(drones: impl IntoIterator<Item = Drone>) -> Result<Self> {
        let registry = Self::new();
        for drone in drones {
            registry.create(drone)?;
        }
        Ok(registry)
    }

    fn record(&self, number: &str) -> Option<Arc<Mutex<Drone>>> {
        self.drones.read().get(number).cloned()
    }
}

impl DroneRegistry for InMemoryDroneRegistry {
    fn create(&self, drone: Drone) -> Result<()> {
        let mut drones = self.drones.write();
        if drones.contains_key(&drone.number) {
            return Err(Error::DroneAlreadyExists(drone.number));
        }
        drones.insert(drone.number.clone(), Arc::new(Mutex::new(drone)));
        Ok(())
    }

    fn find(&self, number: &str) -> Result<Option<Drone>> {
        Ok(self.record(number).map(|record| record.lock().clone()))
    }

    fn list(&self) -> Result<Vec<Drone>> {
        // Snapshot the handles first so the map lock is not held while
        // waiting on a busy drone.
        let records: Vec<_> = self.drones.read().values().cloned().collect();
        Ok(records.iter().map(|record| record.lock().clone()).collect())
    }

    fn with_drone_mut<T, F>(&self, number: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Drone) -> Result<T>,
    {
        let record = self
            .record(number)
            .ok_or_else(|| Error::DroneNotFound(number.to_string()))?;

        let mut guard = record.lock();
        let mut working = guard.clone();
        let out = f(&mut working)?;
        *guard = working;
        Ok(out)
    }
}

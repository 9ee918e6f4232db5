//! Fleet use-case service.
//!
//! Single entry point for callers: drone and medication registration, the
//! load command, fleet reporting, and tick driving. Persistence is
//! delegated to the registry, catalog and event log implementations the
//! service is built with.

use crate::catalog::MedicationCatalog;
use crate::engine::{PeriodicEngine, TickReport};
use crate::event_log::EventLogStore;
use crate::machine::StateMachine;
use crate::reader::AggregationReader;
use crate::registry::DroneRegistry;
use crate::ticker::Ticker;
use crate::validator::LoadValidator;
use crate::{
    Config, Drone, DroneMedicationsAmount, DroneSpec, Error, EventLog, Medication, Result,
};
use std::sync::Arc;

pub struct DronesService<R, M, L> {
    registry: Arc<R>,
    catalog: Arc<M>,
    logs: Arc<L>,
    validator: LoadValidator<R, M, L>,
    reader: AggregationReader<R, M, L>,
    engine: PeriodicEngine<R, L>,
    config: Config,
}

impl<R, M, L> DronesService<R, M, L>
where
    R: DroneRegistry,
    M: MedicationCatalog,
    L: EventLogStore,
{
    /// Wire the service over the given stores
    ///
    /// The configuration is validated here so a bad threshold or delta
    /// never reaches the engine.
    pub fn new(registry: Arc<R>, catalog: Arc<M>, logs: Arc<L>, config: Config) -> Result<Self> {
        config.validate()?;
        let fleet = &config.fleet;
        let loading_state = config.transitions.entry_state();

        let validator = LoadValidator::new(
            Arc::clone(&registry),
            Arc::clone(&catalog),
            Arc::clone(&logs),
            fleet.capacity_threshold,
            loading_state,
        );
        let reader = AggregationReader::new(
            Arc::clone(&registry),
            Arc::clone(&catalog),
            Arc::clone(&logs),
            fleet.capacity_threshold,
            loading_state,
        );
        let machine = StateMachine::new(
            config.transitions.clone(),
            fleet.capacity_delta_per_time_unit,
        );
        let engine = PeriodicEngine::new(Arc::clone(&registry), Arc::clone(&logs), machine);

        Ok(Self {
            registry,
            catalog,
            logs,
            validator,
            reader,
            engine,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn catalog(&self) -> &M {
        &self.catalog
    }

    pub fn logs(&self) -> &L {
        &self.logs
    }

    /// Shared handles to the stores, for work that outlives a borrow
    pub fn stores(&self) -> (Arc<R>, Arc<M>, Arc<L>) {
        (
            Arc::clone(&self.registry),
            Arc::clone(&self.catalog),
            Arc::clone(&self.logs),
        )
    }

    /// Register a drone; it always starts idle
    pub fn register_drone(&self, spec: DroneSpec) -> Result<Drone> {
        tracing::debug!("service got drone spec: {:?}", spec);
        let errors = spec.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors.join("; ")));
        }

        let drone = spec.into_drone();
        self.registry.create(drone.clone())?;
        tracing::info!("Registered drone {}", drone.number);
        Ok(drone)
    }

    pub fn register_medication(&self, medication: Medication) -> Result<Medication> {
        let errors = medication.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors.join("; ")));
        }

        self.catalog.insert(medication.clone())?;
        tracing::info!("Registered medication {}", medication.code);
        Ok(medication)
    }

    pub fn load_drone(&self, drone_number: &str, medication_code: &str) -> Result<EventLog> {
        self.validator.load_drone(drone_number, medication_code)
    }

    pub fn check_medication_items(&self, drone_number: &str) -> Result<Vec<Medication>> {
        self.reader.check_medication_items(drone_number)
    }

    pub fn check_available_drones(&self) -> Result<Vec<Drone>> {
        self.reader.check_available_drones()
    }

    pub fn check_battery_level(&self, drone_number: &str) -> Result<u8> {
        self.reader.check_battery_level(drone_number)
    }

    pub fn check_logs(&self, drone_number: &str) -> Result<Vec<EventLog>> {
        self.reader.check_logs(drone_number)
    }

    pub fn check_drones_medication_items_amounts(&self) -> Result<Vec<DroneMedicationsAmount>> {
        self.reader.check_drones_medication_items_amounts()
    }

    /// Run one engine tick synchronously
    pub fn tick(&self) -> TickReport {
        self.engine.tick()
    }

    pub fn engine(&self) -> &PeriodicEngine<R, L> {
        &self.engine
    }
}

impl<R, M, L> DronesService<R, M, L>
where
    R: DroneRegistry + 'static,
    M: MedicationCatalog,
    L: EventLogStore + 'static,
{
    /// Start ticking the engine at the configured interval
    pub fn start_ticker(&self) -> Result<Ticker> {
        self.start_ticker_with(|_| Ok(()))
    }

    /// Start ticking, running `after_tick` on the ticker thread once each
    /// tick's updates are in place
    ///
    /// A failing `after_tick` is logged and the ticker keeps going.
    pub fn start_ticker_with<F>(&self, mut after_tick: F) -> Result<Ticker>
    where
        F: FnMut(&TickReport) -> Result<()> + Send + 'static,
    {
        let engine = self.engine.clone();
        Ticker::start(self.config.fleet.tick_interval(), move || {
            let report = engine.tick();
            tracing::trace!(
                "tick done: {} processed, {} logs, {} skipped",
                report.processed,
                report.logs_written,
                report.skipped.len()
            );
            if let Err(e) = after_tick(&report) {
                tracing::error!("after-tick hook failed: {}", e);
            }
        })
    }
}

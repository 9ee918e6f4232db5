#![forbid(unsafe_code)]

//! Core domain model and business logic for the drone delivery fleet.
//!
//! This crate provides:
//! - Domain types (drones, medications, event log entries)
//! - Registry, catalog and event log storage contracts with in-memory and
//!   file-backed implementations
//! - The lifecycle state machine and the periodic engine that drives it
//! - Load command validation and fleet reporting
//! - A fixed-delay ticker

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod machine;
pub mod registry;
pub mod catalog;
pub mod event_log;
pub mod wal;
pub mod state;
pub mod csv_export;
pub mod validator;
pub mod engine;
pub mod reader;
pub mod ticker;
pub mod service;

// Re-export commonly used types
pub use error::{Error, ErrorKind, Result};
pub use types::*;
pub use config::Config;
pub use machine::{Decision, StateMachine, TransitionTable};
pub use registry::{DroneRegistry, InMemoryDroneRegistry};
pub use catalog::{default_medications, InMemoryMedicationCatalog, MedicationCatalog};
pub use event_log::{EventLogStore, InMemoryEventLogStore};
pub use wal::JsonlEventLogStore;
pub use state::{FleetLock, FleetSnapshot};
pub use csv_export::export_logs_csv;
pub use engine::{PeriodicEngine, SkippedDrone, TickReport};
pub use ticker::Ticker;
pub use service::DronesService;

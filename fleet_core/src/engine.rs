//! Periodic state-transition engine.
//!
//! One tick walks the whole fleet. For each drone, under that drone's lock:
//! - ask the [`StateMachine`] for the next state and battery
//! - if a log entry is due, copy the medication reference forward from
//!   the drone's latest entry and append the new entry
//! - store the new state and battery
//!
//! An active drone without any log history cannot have been loaded
//! through the validator. It is reported and skipped; the rest of the
//! fleet is still processed and the drone is retried on the next tick.

use crate::event_log::EventLogStore;
use crate::machine::StateMachine;
use crate::registry::DroneRegistry;
use crate::{Error, NewEventLog, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Drone whose step was skipped during a tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedDrone {
    pub number: String,
    pub reason: String,
}

/// Summary of one tick
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub processed: usize,
    pub logs_written: usize,
    pub skipped: Vec<SkippedDrone>,
}

/// What happened to a single drone during a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepOutcome {
    Logged,
    Silent,
}

pub struct PeriodicEngine<R, L> {
    registry: Arc<R>,
    logs: Arc<L>,
    machine: StateMachine,
}

impl<R, L> Clone for PeriodicEngine<R, L> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            logs: Arc::clone(&self.logs),
            machine: self.machine.clone(),
        }
    }
}

impl<R, L> PeriodicEngine<R, L>
where
    R: DroneRegistry,
    L: EventLogStore,
{
    pub fn new(registry: Arc<R>, logs: Arc<L>, machine: StateMachine) -> Self {
        Self {
            registry,
            logs,
            machine,
        }
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Advance every drone by one step
    pub fn tick(&self) -> TickReport {
        self.tick_at(Utc::now())
    }

    /// Advance every drone by one step, stamping new entries with `now`
    pub fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        let drones = match self.registry.list() {
            Ok(drones) => drones,
            Err(e) => {
                tracing::error!("Failed to list drones, skipping tick: {}", e);
                return report;
            }
        };
        tracing::trace!("there are {} drones", drones.len());

        for drone in drones {
            match self.step(&drone.number, now) {
                Ok(outcome) => {
                    report.processed += 1;
                    if outcome == StepOutcome::Logged {
                        report.logs_written += 1;
                    }
                }
                Err(e) => {
                    tracing::error!("Skipping drone {} this tick: {}", drone.number, e);
                    report.skipped.push(SkippedDrone {
                        number: drone.number,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    fn step(&self, number: &str, now: DateTime<Utc>) -> Result<StepOutcome> {
        let machine = &self.machine;
        let logs = &self.logs;

        self.registry.with_drone_mut(number, |drone| {
            tracing::trace!(
                "before processing - drone: {}, battery capacity: {}, state: {}",
                drone.number,
                drone.battery_capacity,
                drone.state
            );

            let was_idle = drone.state.is_idle();
            let decision = machine.decide(drone.state, drone.battery_capacity)?;

            let latest = if decision.must_log {
                logs.find_latest_by_drone(&drone.number)?
            } else {
                None
            };
            if decision.must_log && latest.is_none() && !was_idle {
                return Err(Error::InternalInconsistency(format!(
                    "drone {} is {} but has no event log history",
                    drone.number, drone.state
                )));
            }

            drone.state = decision.next_state;
            drone.battery_capacity = decision.next_battery;

            let outcome = match latest {
                Some(previous) => {
                    let log = logs.append(NewEventLog::for_drone(
                        drone,
                        &previous.medication_code,
                        now,
                    ))?;
                    tracing::trace!("saved event log: {:?}", log);
                    StepOutcome::Logged
                }
                None => {
                    if decision.must_log {
                        // No medication to reference for a drone that never carried anything
                        tracing::warn!(
                            "drone {} recharging without history, no log written",
                            drone.number
                        );
                    }
                    StepOutcome::Silent
                }
            };

            tracing::trace!(
                "after processing - drone: {}, battery capacity: {}, state: {}",
                drone.number,
                drone.battery_capacity,
                drone.state
            );
            Ok(outcome)
        })
    }
}

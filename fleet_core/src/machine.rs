//! Drone lifecycle state machine.
//!
//! The active states form a single path that starts at `loading` and ends
//! back at `idle`. [`TransitionTable`] can only be built from a path that
//! passes validation, so [`StateMachine::decide`] never loops forever and
//! never leaves a drone stranded in an active state.

use crate::{Error, Result, State, FULL_BATTERY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered list of active states as written in configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransitionPath {
    pub path: Vec<State>,
}

/// Validated successor table for active states
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransitionPath", into = "TransitionPath")]
pub struct TransitionTable {
    path: Vec<State>,
    next: HashMap<State, State>,
}

impl TransitionTable {
    /// Build a table where each state moves to the one after it and the
    /// last state moves to idle
    pub fn from_path(path: Vec<State>) -> Result<Self> {
        let first = path
            .first()
            .ok_or_else(|| Error::Config("transition path must not be empty".into()))?;
        if *first != State::Loading {
            return Err(Error::Config(format!(
                "transition path must start with loading, found {}",
                first
            )));
        }

        let mut next = HashMap::with_capacity(path.len());
        for (idx, state) in path.iter().enumerate() {
            if state.is_idle() {
                return Err(Error::Config(
                    "transition path must not contain idle".into(),
                ));
            }
            let successor = path.get(idx + 1).copied().unwrap_or(State::Idle);
            if next.insert(*state, successor).is_some() {
                return Err(Error::Config(format!(
                    "state {} appears more than once in transition path",
                    state
                )));
            }
        }

        Ok(Self { path, next })
    }

    /// Successor of an active state, if the table covers it
    pub fn next(&self, state: State) -> Option<State> {
        self.next.get(&state).copied()
    }

    /// State a drone enters when it accepts a load
    pub fn entry_state(&self) -> State {
        self.path[0]
    }

    pub fn path(&self) -> &[State] {
        &self.path
    }

    /// Number of ticks an active cycle takes to get back to idle
    pub fn cycle_len(&self) -> usize {
        self.path.len()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::from_path(default_path()).expect("default transition path is valid")
    }
}

impl TryFrom<TransitionPath> for TransitionTable {
    type Error = Error;

    fn try_from(value: TransitionPath) -> Result<Self> {
        Self::from_path(value.path)
    }
}

impl From<TransitionTable> for TransitionPath {
    fn from(table: TransitionTable) -> Self {
        TransitionPath { path: table.path }
    }
}

/// Loading through the delivery legs and back
pub fn default_path() -> Vec<State> {
    vec![
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
    ]
}

/// Outcome of one state machine step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub next_state: State,
    pub next_battery: u8,
    pub must_log: bool,
}

/// Pure per-tick decision function
#[derive(Clone, Debug)]
pub struct StateMachine {
    table: TransitionTable,
    delta: u8,
}

impl StateMachine {
    pub fn new(table: TransitionTable, delta: u8) -> Self {
        Self { table, delta }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn delta(&self) -> u8 {
        self.delta
    }

    /// Compute the next state and battery for a drone
    ///
    /// Idle drones recharge up to full and log only while still charging.
    /// Active drones advance one step along the table, drain the battery
    /// (never below zero) and always log.
    pub fn decide(&self, state: State, battery: u8) -> Result<Decision> {
        if state.is_idle() {
            return Ok(Decision {
                next_state: State::Idle,
                next_battery: battery.saturating_add(self.delta).min(FULL_BATTERY),
                must_log: battery < FULL_BATTERY,
            });
        }

        let next_state = self.table.next(state).ok_or_else(|| {
            Error::InternalInconsistency(format!(
                "active state {} has no successor in the transition table",
                state
            ))
        })?;

        let next_battery = battery.saturating_sub(self.delta);
        if u16::from(battery) < u16::from(self.delta) {
            tracing::warn!(
                "Battery drained to zero during {} (was {}%, delta {})",
                state,
                battery,
                self.delta
            );
        }

        Ok(Decision {
            next_state,
            next_battery,
            must_log: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StateMachine {
        StateMachine::new(TransitionTable::default(), 2)
    }

    #[test]
    fn test_idle_recharges_and_logs_until_full() {
        let m = machine();
        let d = m.decide(State::Idle, 78).unwrap();
        assert_eq!(d, Decision { next_state: State::Idle, next_battery: 80, must_log: true });

        let d = m.decide(State::Idle, 99).unwrap();
        assert_eq!(d.next_battery, 100);
        assert!(d.must_log);

        let d = m.decide(State::Idle, 100).unwrap();
        assert_eq!(d.next_battery, 100);
        assert!(!d.must_log);
    }

    #[test]
    fn test_active_state_advances_and_drains() {
        let m = machine();
        let d = m.decide(State::Loading, 100).unwrap();
        assert_eq!(d, Decision { next_state: State::Loaded, next_battery: 98, must_log: true });

        let d = m.decide(State::Returning3, 80).unwrap();
        assert_eq!(d.next_state, State::Idle);
        assert_eq!(d.next_battery, 78);
        assert!(d.must_log);
    }

    #[test]
    fn test_active_drain_stops_at_zero() {
        let d = machine().decide(State::Delivered, 1).unwrap();
        assert_eq!(d.next_battery, 0);
    }

    #[test]
    fn test_full_cycle_returns_to_idle() {
        let m = machine();
        let mut state = State::Loading;
        let mut battery = 100;
        let mut ticks = 0;
        while !state.is_idle() {
            let d = m.decide(state, battery).unwrap();
            state = d.next_state;
            battery = d.next_battery;
            ticks += 1;
        }
        assert_eq!(ticks, m.table().cycle_len());
        assert_eq!(battery, 78);
    }

    #[test]
    fn test_unmapped_active_state_is_inconsistent() {
        let table = TransitionTable::from_path(vec![State::Loading, State::Delivering]).unwrap();
        let m = StateMachine::new(table, 2);
        let err = m.decide(State::Returning, 50).unwrap_err();
        assert!(matches!(err, Error::InternalInconsistency(_)));
    }

    #[test]
    fn test_path_validation() {
        assert!(TransitionTable::from_path(vec![]).is_err());
        assert!(TransitionTable::from_path(vec![State::Loaded]).is_err());
        assert!(TransitionTable::from_path(vec![State::Loading, State::Idle]).is_err());
        assert!(
            TransitionTable::from_path(vec![State::Loading, State::Loaded, State::Loading]).is_err()
        );

        let short = TransitionTable::from_path(vec![State::Loading]).unwrap();
        assert_eq!(short.next(State::Loading), Some(State::Idle));
        assert_eq!(short.entry_state(), State::Loading);
    }

    #[test]
    fn test_table_deserializes_from_path() {
        let table: TransitionTable =
            toml::from_str("path = [\"loading\", \"delivering\", \"returning\"]").unwrap();
        assert_eq!(table.next(State::Delivering), Some(State::Returning));
        assert_eq!(table.next(State::Returning), Some(State::Idle));

        let bad: std::result::Result<TransitionTable, _> = toml::from_str("path = [\"idle\"]");
        assert!(bad.is_err());
    }
}

//! Append-only event log contract and in-memory implementation.
//!
//! Entries are never updated or removed. Newest-first queries order by
//! timestamp and fall back to the id for entries written in the same
//! instant, so the latest entry of a drone is always well defined.

use crate::{EventLog, NewEventLog, Result, State};
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Append-only storage for log entries
pub trait EventLogStore: Send + Sync {
    /// Persist an entry and return it with its assigned id
    fn append(&self, entry: NewEventLog) -> Result<EventLog>;

    /// All entries for a drone, newest first
    fn find_by_drone(&self, drone_number: &str) -> Result<Vec<EventLog>>;

    fn find_latest_by_drone(&self, drone_number: &str) -> Result<Option<EventLog>>;

    /// Entries for a drone recorded in `state`, oldest first
    fn find_by_drone_and_state(&self, drone_number: &str, state: State) -> Result<Vec<EventLog>>;

    /// Number of entries recorded in `state`, keyed by drone number
    ///
    /// Drones without such entries are absent from the map.
    fn count_by_state(&self, state: State) -> Result<HashMap<String, usize>>;

    /// Every entry in append order
    fn all(&self) -> Result<Vec<EventLog>>;

    /// Largest id assigned so far
    fn last_id(&self) -> Result<Option<u64>>;
}

/// Event log held in memory
#[derive(Default)]
pub struct InMemoryEventLogStore {
    inner: RwLock<Entries>,
}

struct Entries {
    logs: Vec<EventLog>,
    next_id: u64,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            logs: Vec::new(),
            next_id: 1,
        }
    }
}

impl InMemoryEventLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore previously persisted entries; new ids continue after the
    /// largest existing one
    pub fn from_entries(mut logs: Vec<EventLog>) -> Self {
        logs.sort_by_key(|log| log.id);
        let next_id = logs.last().map_or(1, |log| log.id + 1);
        Self {
            inner: RwLock::new(Entries { logs, next_id }),
        }
    }

    /// Id the next appended entry will receive
    pub fn next_id(&self) -> u64 {
        self.inner.read().next_id
    }

    pub(crate) fn push(&self, entry: NewEventLog) -> EventLog {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        let log = entry.with_id(id);
        inner.logs.push(log.clone());
        log
    }

    pub(crate) fn push_existing(&self, log: EventLog) {
        let mut inner = self.inner.write();
        inner.next_id = inner.next_id.max(log.id + 1);
        inner.logs.push(log);
    }
}

fn newest_first(logs: &mut [EventLog]) {
    logs.sort_by_key(|log| Reverse((log.timestamp, log.id)));
}

impl EventLogStore for InMemoryEventLogStore {
    fn append(&self, entry: NewEventLog) -> Result<EventLog> {
        Ok(self.push(entry))
    }

    fn find_by_drone(&self, drone_number: &str) -> Result<Vec<EventLog>> {
        let mut logs: Vec<_> = self
            .inner
            .read()
            .logs
            .iter()
            .filter(|log| log.drone_number == drone_number)
            .cloned()
            .collect();
        newest_first(&mut logs);
        Ok(logs)
    }

    fn find_latest_by_drone(&self, drone_number: &str) -> Result<Option<EventLog>> {
        Ok(self
            .inner
            .read()
            .logs
            .iter()
            .filter(|log| log.drone_number == drone_number)
            .max_by_key(|log| (log.timestamp, log.id))
            .cloned())
    }

    fn find_by_drone_and_state(&self, drone_number: &str, state: State) -> Result<Vec<EventLog>> {
        Ok(self
            .inner
            .read()
            .logs
            .iter()
            .filter(|log| log.drone_number == drone_number && log.state == state)
            .cloned()
            .collect())
    }

    fn count_by_state(&self, state: State) -> Result<HashMap<String, usize>> {
        let mut counts = HashMap::new();
        for log in self.inner.read().logs.iter().filter(|log| log.state == state) {
            *counts.entry(log.drone_number.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn all(&self) -> Result<Vec<EventLog>> {
        Ok(self.inner.read().logs.clone())
    }

    fn last_id(&self) -> Result<Option<u64>> {
        Ok(self.inner.read().logs.iter().map(|log| log.id).max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(drone: &str, state: State, secs: i64) -> NewEventLog {
        NewEventLog {
            drone_number: drone.into(),
            medication_code: "MED_1".into(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs),
            state,
            battery_capacity: 90,
        }
    }

    #[test]
    fn test_ids_increase_monotonically() {
        let store = InMemoryEventLogStore::new();
        let a = store.append(entry("D1", State::Loading, 0)).unwrap();
        let b = store.append(entry("D2", State::Loading, 0)).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[test]
    fn test_find_by_drone_is_newest_first() {
        let store = InMemoryEventLogStore::new();
        store.append(entry("D1", State::Loading, 0)).unwrap();
        store.append(entry("D1", State::Loaded, 5)).unwrap();
        store.append(entry("D2", State::Loading, 7)).unwrap();
        store.append(entry("D1", State::Delivering, 10)).unwrap();

        let states: Vec<_> = store
            .find_by_drone("D1")
            .unwrap()
            .into_iter()
            .map(|log| log.state)
            .collect();
        assert_eq!(states, vec![State::Delivering, State::Loaded, State::Loading]);
    }

    #[test]
    fn test_latest_breaks_timestamp_ties_by_id() {
        let store = InMemoryEventLogStore::new();
        store.append(entry("D1", State::Loading, 0)).unwrap();
        let second = store.append(entry("D1", State::Loaded, 0)).unwrap();

        let latest = store.find_latest_by_drone("D1").unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(store.find_by_drone("D1").unwrap()[0].id, second.id);
        assert!(store.find_latest_by_drone("D9").unwrap().is_none());
    }

    #[test]
    fn test_count_by_state() {
        let store = InMemoryEventLogStore::new();
        store.append(entry("D1", State::Loading, 0)).unwrap();
        store.append(entry("D1", State::Loaded, 1)).unwrap();
        store.append(entry("D1", State::Loading, 2)).unwrap();
        store.append(entry("D2", State::Loading, 3)).unwrap();

        let counts = store.count_by_state(State::Loading).unwrap();
        assert_eq!(counts.get("D1"), Some(&2));
        assert_eq!(counts.get("D2"), Some(&1));
        assert_eq!(store.find_by_drone_and_state("D1", State::Loading).unwrap().len(), 2);
    }

    #[test]
    fn test_restored_store_continues_ids() {
        let logs = vec![
            entry("D1", State::Loading, 0).with_id(7),
            entry("D1", State::Loaded, 1).with_id(3),
        ];
        let store = InMemoryEventLogStore::from_entries(logs);
        assert_eq!(store.next_id(), 8);
        let appended = store.append(entry("D1", State::Delivering, 2)).unwrap();
        assert_eq!(appended.id, 8);
        assert_eq!(store.last_id().unwrap(), Some(8));
    }

    #[test]
    fn test_fresh_store_starts_at_one() {
        let store = InMemoryEventLogStore::new();
        assert_eq!(store.next_id(), 1);
        assert_eq!(store.last_id().unwrap(), None);

        let restored = InMemoryEventLogStore::from_entries(Vec::new());
        assert_eq!(restored.next_id(), 1);
        assert_eq!(restored.append(entry("D1", State::Loading, 0)).unwrap().id, 1);
    }
}

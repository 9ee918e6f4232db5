//! Fleet snapshot persistence with file locking.
//!
//! Drone and medication records are saved together as one JSON document.
//! Writes go to a temp file that is renamed over the original. The
//! snapshot remembers how much of the event log it already reflects, so
//! entries appended after the last save can be rolled forward on load.

use crate::catalog::{InMemoryMedicationCatalog, MedicationCatalog};
use crate::event_log::EventLogStore;
use crate::registry::{DroneRegistry, InMemoryDroneRegistry};
use crate::{Drone, Error, Medication, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Persisted drone and medication records
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FleetSnapshot {
    #[serde(default)]
    pub drones: Vec<Drone>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    /// Log entries with this id or higher were written after the snapshot
    #[serde(default)]
    pub next_log_id: u64,
}

impl FleetSnapshot {
    /// Snapshot seeded with the built-in medications and no drones
    pub fn seeded() -> Self {
        Self {
            drones: Vec::new(),
            medications: crate::catalog::default_medications().to_vec(),
            next_log_id: 1,
        }
    }

    /// Capture the current contents of a registry and catalog, and the
    /// point the event log has reached
    pub fn capture<R, M, L>(registry: &R, catalog: &M, logs: &L) -> Result<Self>
    where
        R: DroneRegistry + ?Sized,
        M: MedicationCatalog + ?Sized,
        L: EventLogStore + ?Sized,
    {
        Ok(Self {
            drones: registry.list()?,
            medications: catalog.list()?,
            next_log_id: logs.last_id()?.map_or(1, |id| id + 1),
        })
    }

    /// Bring drone records up to date with log entries written after this
    /// snapshot was saved
    ///
    /// Every entry records the drone's state and battery right after a load
    /// or tick step, so replaying them in id order restores the records a
    /// process lost when it stopped between appending and saving. Returns
    /// the number of entries applied.
    pub fn roll_forward<L>(&mut self, logs: &L) -> Result<usize>
    where
        L: EventLogStore + ?Sized,
    {
        let mut pending: Vec<_> = logs
            .all()?
            .into_iter()
            .filter(|log| log.id >= self.next_log_id)
            .collect();
        pending.sort_by_key(|log| log.id);

        let mut applied = 0;
        for log in &pending {
            match self.drones.iter_mut().find(|d| d.number == log.drone_number) {
                Some(drone) => {
                    drone.state = log.state;
                    drone.battery_capacity = log.battery_capacity;
                    applied += 1;
                }
                None => tracing::warn!(
                    "Event log {} references unknown drone {}",
                    log.id,
                    log.drone_number
                ),
            }
        }

        if let Some(last) = pending.last() {
            self.next_log_id = last.id + 1;
        }
        if applied > 0 {
            tracing::warn!("Rolled {} unsaved log entries forward into the fleet", applied);
        }
        Ok(applied)
    }

    /// Split the snapshot into in-memory stores
    pub fn into_stores(self) -> Result<(InMemoryDroneRegistry, InMemoryMedicationCatalog)> {
        Ok((
            InMemoryDroneRegistry::from_drones(self.drones)?,
            InMemoryMedicationCatalog::from_medications(self.medications)?,
        ))
    }

    /// Load a snapshot with shared locking
    ///
    /// Returns a seeded snapshot if the file doesn't exist. A file that
    /// exists but cannot be parsed is an error: silently starting over
    /// would forget registered drones.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No fleet file found at {:?}, starting with default medications", path);
            return Ok(Self::seeded());
        }

        let file = File::open(path)?;

        // Acquire shared lock for reading
        file.lock_shared()?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            return Err(e.into());
        }

        file.unlock()?;

        let snapshot: FleetSnapshot = serde_json::from_str(&contents)?;
        tracing::debug!(
            "Loaded {} drones and {} medications from {:?}",
            snapshot.drones.len(),
            snapshot.medications.len(),
            path
        );
        Ok(snapshot)
    }

    /// Save the snapshot with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Create unique temp file in the same directory for atomic rename
        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            Error::Other(format!("fleet path {:?} has no parent directory", path))
        })?)?;

        // Acquire exclusive lock on the temp file to serialize concurrent writers
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        // Atomically replace old fleet file
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved fleet snapshot to {:?}", path);
        Ok(())
    }
}

/// Exclusive hold on a data directory
///
/// Commands that read the snapshot and later save it hold this for their
/// whole run, so two processes never interleave their read-modify-save.
/// The lock is released when the value is dropped or the process exits.
pub struct FleetLock {
    file: File,
    path: PathBuf,
}

impl FleetLock {
    pub const FILE_NAME: &'static str = "fleet.lock";

    /// Block until the directory's lock file is ours
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(Self::FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            tracing::info!("Waiting for another process to release {:?}", path);
            file.lock_exclusive()?;
        }
        tracing::debug!("Acquired {:?}", path);
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FleetLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release {:?}: {}", self.path, e);
        }
    }
}

//! Durable event log stored as JSON Lines.
//!
//! Entries are appended to a JSONL file under an exclusive file lock and
//! mirrored in memory for queries. Before assigning an id, and before every
//! query, the store reads whatever other writers appended since its last
//! read, so ids stay unique across processes sharing one file.

use crate::event_log::{EventLogStore, InMemoryEventLogStore};
use crate::{EventLog, NewEventLog, Result, State};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// JSONL-backed event log with file locking
pub struct JsonlEventLogStore {
    path: PathBuf,
    memory: InMemoryEventLogStore,
    cursor: Mutex<Cursor>,
}

/// How far into the file the in-memory copy reaches
#[derive(Default)]
struct Cursor {
    offset: u64,
    line: usize,
    /// The last line read had no newline (a writer died mid-line)
    torn_tail: bool,
}

impl JsonlEventLogStore {
    /// Open (or lazily create) the log at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            memory: InMemoryEventLogStore::new(),
            cursor: Mutex::new(Cursor::default()),
        };
        store.refresh()?;
        tracing::debug!(
            "Opened event log {:?} with {} entries",
            store.path,
            store.memory.all()?.len()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Pull in entries other writers appended since the last read
    fn refresh(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        let mut cursor = self.cursor.lock();
        let file = File::open(&self.path)?;

        // Acquire shared lock for reading
        file.lock_shared()?;
        let result = self.catch_up(&file, &mut cursor);
        file.unlock()?;
        result
    }

    /// Read from the cursor to the end of the file; the caller holds a lock
    fn catch_up(&self, file: &File, cursor: &mut Cursor) -> Result<()> {
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(cursor.offset))?;

        let mut line = String::new();
        let mut read = 0;
        loop {
            line.clear();
            let len = reader.read_line(&mut line)?;
            if len == 0 {
                break;
            }
            cursor.offset += len as u64;
            cursor.line += 1;
            cursor.torn_tail = !line.ends_with('\n');

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<EventLog>(trimmed) {
                Ok(entry) => {
                    self.memory.push_existing(entry);
                    read += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to parse event log at line {}: {}", cursor.line, e);
                }
            }
        }

        if read > 0 {
            tracing::debug!("Read {} entries from {:?}", read, self.path);
        }
        Ok(())
    }
}

impl EventLogStore for JsonlEventLogStore {
    fn append(&self, entry: NewEventLog) -> Result<EventLog> {
        let mut cursor = self.cursor.lock();
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        let result = self.catch_up(&file, &mut cursor).and_then(|()| {
            let log = entry.with_id(self.memory.next_id());
            let mut line = serde_json::to_string(&log)?;
            line.push('\n');
            if cursor.torn_tail {
                // Finish the partial line so this entry starts on its own
                line.insert(0, '\n');
            }

            (&file).write_all(line.as_bytes())?;
            (&file).flush()?;
            cursor.offset += line.len() as u64;
            cursor.line += line.matches('\n').count();
            cursor.torn_tail = false;
            Ok(log)
        });

        file.unlock()?;

        // Only entries that reached the file become visible to queries
        let log = result?;
        self.memory.push_existing(log.clone());
        tracing::trace!("Appended log {} for drone {}", log.id, log.drone_number);
        Ok(log)
    }

    fn find_by_drone(&self, drone_number: &str) -> Result<Vec<EventLog>> {
        self.refresh()?;
        self.memory.find_by_drone(drone_number)
    }

    fn find_latest_by_drone(&self, drone_number: &str) -> Result<Option<EventLog>> {
        self.refresh()?;
        self.memory.find_latest_by_drone(drone_number)
    }

    fn find_by_drone_and_state(&self, drone_number: &str, state: State) -> Result<Vec<EventLog>> {
        self.refresh()?;
        self.memory.find_by_drone_and_state(drone_number, state)
    }

    fn count_by_state(&self, state: State) -> Result<HashMap<String, usize>> {
        self.refresh()?;
        self.memory.count_by_state(state)
    }

    fn all(&self) -> Result<Vec<EventLog>> {
        self.refresh()?;
        self.memory.all()
    }

    fn last_id(&self) -> Result<Option<u64>> {
        self.refresh()?;
        self.memory.last_id()
    }
}

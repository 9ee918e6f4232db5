//! CSV export of the event log.

use crate::event_log::EventLogStore;
use crate::{EventLog, Result};
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: u64,
    drone_number: String,
    medication_code: String,
    timestamp: String,
    state: String,
    battery_capacity: u8,
}

impl From<&EventLog> for CsvRow {
    fn from(log: &EventLog) -> Self {
        CsvRow {
            id: log.id,
            drone_number: log.drone_number.clone(),
            medication_code: log.medication_code.clone(),
            timestamp: log.timestamp.to_rfc3339(),
            state: log.state.to_string(),
            battery_capacity: log.battery_capacity,
        }
    }
}

/// Write every log entry to `csv_path` in append order, replacing any
/// existing file
///
/// Returns the number of rows written.
pub fn export_logs_csv<L>(store: &L, csv_path: &Path) -> Result<usize>
where
    L: EventLogStore + ?Sized,
{
    let logs = store.all()?;

    // Ensure parent directory exists
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(csv_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);

    for log in &logs {
        writer.serialize(CsvRow::from(log))?;
    }

    // Flush and sync to disk
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} log entries to {:?}", logs.len(), csv_path);
    Ok(logs.len())
}

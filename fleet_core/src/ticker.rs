//! Fixed-delay ticker.
//!
//! The job runs on a dedicated thread; the wait for the next run starts
//! only after the previous run returns, so runs never overlap. Stopping
//! lets an in-flight run finish and then joins the thread.

use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub struct Ticker {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    completed: Arc<AtomicU64>,
    interval: Duration,
}

impl Ticker {
    /// Spawn the ticker thread; the first run happens after one interval
    pub fn start<F>(interval: Duration, mut job: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let completed = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&completed);

        let handle = std::thread::Builder::new()
            .name("fleet-ticker".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        job();
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    // Explicit stop or the Ticker was dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| Error::Other(format!("failed to spawn ticker thread: {}", e)))?;

        tracing::info!("Ticker started with interval {:?}", interval);
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            completed,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of runs that have finished so far
    pub fn completed_ticks(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Stop after any in-flight run and wait for the thread to exit
    ///
    /// Returns the number of completed runs.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.completed_ticks()
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Ticker thread panicked");
            }
            tracing::info!("Ticker stopped after {} ticks", self.completed_ticks());
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, the writer lock, teardown.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use fs2::FileExt;
use jobd_catalog::{Catalog, CatalogError};
use jobd_core::Event;
use jobd_engine::{Supervisor, SupervisorError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::env;

/// Capacity of the child-event channel. Waiter tasks park on send if
/// the loop ever falls this far behind.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors that can occur during daemon startup and shutdown.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine a state directory (no HOME?)")]
    NoStateDir,

    #[error("another jobd instance holds the lock")]
    LockFailed(#[source] io::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Daemon configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Durable catalog database.
    pub db_path: PathBuf,
    /// Volatile state: status records, lock file, log.
    pub runtime_dir: PathBuf,
    /// Path to the lock/PID file.
    pub lock_path: PathBuf,
    /// Path to the daemon log file.
    pub log_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, LifecycleError> {
        let runtime_dir = env::runtime_dir()?;
        Ok(Self {
            db_path: env::db_path()?,
            lock_path: runtime_dir.join("jobd.lock"),
            log_path: runtime_dir.join("jobd.log"),
            runtime_dir,
        })
    }
}

/// Exclusive writer lock, held for the daemon's lifetime. The file
/// carries the holder's pid for diagnostics.
#[derive(Debug)]
pub struct DaemonLock {
    file: File,
    path: PathBuf,
}

impl DaemonLock {
    pub fn acquire(path: &std::path::Path) -> Result<Self, LifecycleError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        Ok(Self { file, path: path.to_path_buf() })
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(error = %e, "could not remove lock file");
        }
    }
}

/// Everything `main` needs after a successful startup.
#[derive(Debug)]
pub struct StartupResult {
    pub supervisor: Supervisor,
    pub event_rx: mpsc::Receiver<Event>,
    pub lock: DaemonLock,
}

/// Acquire the lock, open the catalog, and hand the job table to a
/// fresh supervisor (which truncates the volatile pid table before any
/// event can arrive).
pub fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.runtime_dir)?;
    let lock = DaemonLock::acquire(&config.lock_path)?;

    let catalog = Catalog::open(&config.db_path, false)?;
    info!(db = %config.db_path.display(), "catalog open");

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let supervisor = Supervisor::new(catalog, &config.runtime_dir, event_tx)?;

    Ok(StartupResult { supervisor, event_rx, lock })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

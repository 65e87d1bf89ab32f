// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use crate::lifecycle::LifecycleError;
use std::path::PathBuf;
use std::time::Duration;

/// Resolve the catalog location: JOBD_DB_PATH > <state dir>/jobd/catalog.db
pub fn db_path() -> Result<PathBuf, LifecycleError> {
    if let Ok(path) = std::env::var("JOBD_DB_PATH") {
        return Ok(PathBuf::from(path));
    }
    Ok(state_dir()?.join("jobd").join("catalog.db"))
}

/// Resolve volatile state: JOBD_RUNTIME_DIR > XDG runtime dir > state dir
pub fn runtime_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("JOBD_RUNTIME_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = dirs::runtime_dir() {
        return Ok(dir.join("jobd"));
    }
    Ok(state_dir()?.join("jobd").join("run"))
}

fn state_dir() -> Result<PathBuf, LifecycleError> {
    // honors XDG_STATE_HOME, falls back to ~/.local/state
    dirs::state_dir().ok_or(LifecycleError::NoStateDir)
}

/// Timer check interval (default 1-second resolution, configurable via
/// JOBD_TIMER_CHECK_MS).
pub fn timer_check_interval() -> Duration {
    std::env::var("JOBD_TIMER_CHECK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(1))
}

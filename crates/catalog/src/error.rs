// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for catalog operations.

use jobd_core::{Pid, RowId};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the catalog store.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog already exists at {0}")]
    Exists(PathBuf),

    #[error("catalog not found at {0}")]
    Missing(PathBuf),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A second live pid was registered for the same job row. This
    /// means an exit event was lost; the caller recovers by
    /// synthesizing one for the stale pid.
    #[error("job row {row_id} already registered pid {pid}")]
    AlreadyRegistered { row_id: RowId, pid: Pid },

    #[error("not found: {0}")]
    NotFound(String),
}

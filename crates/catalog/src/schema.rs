// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalog schema and connection setup.
//!
//! `job_pids` is volatile: the supervisor truncates it at startup,
//! before any child event can be accepted. Everything else is durable.

use crate::error::CatalogError;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Applied once by `create`. AUTOINCREMENT keeps row ids monotonic and
/// never reused, which the pid bookkeeping relies on.
const SCHEMA: &str = "
CREATE TABLE jobs (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    command TEXT NOT NULL,
    description TEXT,
    enable INTEGER NOT NULL DEFAULT 1,
    exclusive INTEGER NOT NULL DEFAULT 0,
    keep_alive INTEGER NOT NULL DEFAULT 0,
    title TEXT,
    root_directory TEXT,
    working_directory TEXT,
    standard_in_path TEXT,
    standard_out_path TEXT,
    standard_err_path TEXT,
    umask INTEGER,
    uid INTEGER,
    gid INTEGER,
    user_name TEXT,
    group_name TEXT,
    init_groups INTEGER NOT NULL DEFAULT 0,
    last_exit_status INTEGER,
    term_signal INTEGER
);

CREATE TABLE job_env (
    row_id INTEGER NOT NULL REFERENCES jobs(row_id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (row_id, ordinal)
);

CREATE TABLE job_options (
    row_id INTEGER NOT NULL REFERENCES jobs(row_id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (row_id, ordinal)
);

CREATE TABLE job_before (
    row_id INTEGER NOT NULL REFERENCES jobs(row_id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (row_id, ordinal)
);

CREATE TABLE job_after (
    row_id INTEGER NOT NULL REFERENCES jobs(row_id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (row_id, ordinal)
);

CREATE TABLE job_edges (
    predecessor_id TEXT NOT NULL,
    successor_id TEXT NOT NULL,
    UNIQUE (predecessor_id, successor_id)
);

CREATE TABLE job_pids (
    row_id INTEGER NOT NULL UNIQUE REFERENCES jobs(row_id) ON DELETE CASCADE,
    pid INTEGER NOT NULL UNIQUE,
    started_at TEXT NOT NULL
);
";

/// Initialize a new catalog. Refuses to touch an existing file.
pub(crate) fn create(path: &Path) -> Result<Connection, CatalogError> {
    if path.exists() {
        return Err(CatalogError::Exists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    // WAL is persistent; setting it once at create covers later opens.
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    configure(&conn)?;
    conn.execute_batch(SCHEMA)?;
    tracing::debug!(path = %path.display(), "created catalog");
    Ok(conn)
}

/// Open an existing catalog.
pub(crate) fn open(path: &Path, read_only: bool) -> Result<Connection, CatalogError> {
    if !path.exists() {
        return Err(CatalogError::Missing(path.to_path_buf()));
    }
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
    };
    let conn = Connection::open_with_flags(path, flags)?;
    configure(&conn)?;
    Ok(conn)
}

/// WAL keeps readers from blocking the single writer; the busy timeout
/// covers the handoff between CLI invocations and the daemon.
fn configure(conn: &Connection) -> Result<(), CatalogError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

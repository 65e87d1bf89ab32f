// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable access for the CLI tools.

use anyhow::Context;
use std::path::PathBuf;

/// Resolve the catalog location: JOBD_DB_PATH > <state dir>/jobd/catalog.db
pub fn db_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("JOBD_DB_PATH") {
        return Ok(PathBuf::from(path));
    }
    let state = dirs::state_dir().context("cannot determine a state directory (no HOME?)")?;
    Ok(state.join("jobd").join("catalog.db"))
}

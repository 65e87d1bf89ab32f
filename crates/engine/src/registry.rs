// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bidirectional pid ↔ job-row map.
//!
//! Mirrors the catalog's volatile pid table for the lookups that sit on
//! the event path. Both directions are ordered maps, so lookups stay
//! O(log n) either way.

use jobd_core::{Pid, RowId};
use std::collections::BTreeMap;
use thiserror::Error;

/// A registration collision: the row already has a live pid. Indicates
/// a lost exit event; the supervisor recovers by synthesizing one.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("row {row_id} already maps to pid {pid}")]
pub struct RegistryConflict {
    pub row_id: RowId,
    pub pid: Pid,
}

/// Volatile pid registry. Cleared whole at supervisor startup.
#[derive(Debug, Default)]
pub struct PidRegistry {
    by_pid: BTreeMap<Pid, RowId>,
    by_row: BTreeMap<RowId, Pid>,
}

impl PidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live child. At most one pid per row.
    pub fn insert(&mut self, row_id: RowId, pid: Pid) -> Result<(), RegistryConflict> {
        if let Some(&live) = self.by_row.get(&row_id) {
            return Err(RegistryConflict { row_id, pid: live });
        }
        self.by_pid.insert(pid, row_id);
        self.by_row.insert(row_id, pid);
        Ok(())
    }

    /// Drop a registration by pid, returning the owning row.
    pub fn remove_pid(&mut self, pid: Pid) -> Option<RowId> {
        let row_id = self.by_pid.remove(&pid)?;
        self.by_row.remove(&row_id);
        Some(row_id)
    }

    pub fn pid_of(&self, row_id: RowId) -> Option<Pid> {
        self.by_row.get(&row_id).copied()
    }

    pub fn row_of(&self, pid: Pid) -> Option<RowId> {
        self.by_pid.get(&pid).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pid.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_pid.len()
    }

    pub fn clear(&mut self) {
        self.by_pid.clear();
        self.by_row.clear();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

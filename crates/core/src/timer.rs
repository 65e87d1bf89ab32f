// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identities for the engine scheduler.

use crate::id::RowId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a pending timer will do when it fires.
///
/// A job has at most one timer of each kind; setting a new one
/// replaces the old, and disable cancels both kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// keep_alive restart delay elapsed; fork the job again.
    Restart(RowId),
    /// Stop grace period elapsed; escalate SIGTERM to SIGKILL.
    StopGrace(RowId),
}

impl TimerKind {
    pub fn row_id(self) -> RowId {
        match self {
            TimerKind::Restart(row) | TimerKind::StopGrace(row) => row,
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::Restart(row) => write!(f, "restart:{row}"),
            TimerKind::StopGrace(row) => write!(f, "grace:{row}"),
        }
    }
}

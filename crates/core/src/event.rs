// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events consumed by the supervisor loop.
//!
//! Every suspension point in the system (child reaping, timer expiry,
//! operator signals) is observable as one of these.

use crate::id::Pid;
use crate::timer::TimerKind;
use serde::{Deserialize, Serialize};

/// A single notification for the engine to process.
///
/// Events for a given pid are delivered in arrival order, and a pid is
/// registered before any exit event for it can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Child exited; `code` is the wait status exit code.
    ChildExited { pid: Pid, code: i32 },
    /// Child was killed by `signum`.
    ChildSignaled { pid: Pid, signum: i32 },
    /// A scheduler timer came due.
    Timer(TimerKind),
    /// Orderly supervisor shutdown was requested.
    Shutdown,
}

impl Event {
    /// The pid this event concerns, if any.
    pub fn pid(&self) -> Option<Pid> {
        match self {
            Event::ChildExited { pid, .. } | Event::ChildSignaled { pid, .. } => Some(*pid),
            Event::Timer(_) | Event::Shutdown => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

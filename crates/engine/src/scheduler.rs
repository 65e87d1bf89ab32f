// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart and stop-grace timer management.

use jobd_core::{Event, RowId, TimerKind};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Manages pending timers for the supervisor.
///
/// Time is injected (`now: Instant`) so tests can drive expiry without
/// sleeping.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerKind, Instant>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a timer. Setting the same kind again replaces it.
    pub fn set_timer(&mut self, kind: TimerKind, duration: Duration, now: Instant) {
        self.timers.insert(kind, now + duration);
    }

    /// Cancel a timer
    pub fn cancel_timer(&mut self, kind: TimerKind) {
        self.timers.remove(&kind);
    }

    /// Cancel every timer belonging to a job.
    pub fn cancel_job(&mut self, row_id: RowId) {
        self.timers.retain(|kind, _| kind.row_id() != row_id);
    }

    /// Drain all timers that have come due, as events.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<Event> {
        let mut fired: Vec<TimerKind> = self
            .timers
            .iter()
            .filter(|(_, fires_at)| **fires_at <= now)
            .map(|(kind, _)| *kind)
            .collect();
        // Deterministic dispatch order when several come due together.
        fired.sort_by_key(|kind| kind.row_id());

        for kind in &fired {
            self.timers.remove(kind);
        }
        fired.into_iter().map(Event::Timer).collect()
    }

    /// Get the next timer fire time
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    /// Check if there are any pending timers
    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

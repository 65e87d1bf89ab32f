// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job lifecycle state machine.
//!
//! The table of permitted transitions is closed: anything not listed
//! here is a supervisor bug and surfaces as a [`TransitionError`]
//! rather than silently corrupting bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Loaded from the catalog but not yet examined by the supervisor.
    #[default]
    Unknown,
    /// Start requested; either mid-fork or waiting out a restart delay.
    Starting,
    /// Child process is alive.
    Running,
    /// SIGTERM sent, waiting for the child to exit.
    Stopping,
    /// No live process, eligible for start.
    Stopped,
    /// Start failed, the child exited abnormally, or the job sits in a
    /// dependency cycle.
    Error,
}

impl JobState {
    /// True while a child process may exist for this job.
    pub fn is_live(self) -> bool {
        matches!(self, JobState::Starting | JobState::Running | JobState::Stopping)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Unknown => write!(f, "unknown"),
            JobState::Starting => write!(f, "starting"),
            JobState::Running => write!(f, "running"),
            JobState::Stopping => write!(f, "stopping"),
            JobState::Stopped => write!(f, "stopped"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// An input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// The supervisor took ownership of the catalog row.
    Load,
    /// The solver released the job for starting.
    Start,
    /// Fork succeeded and the child reached exec.
    Exec,
    /// Fork, credential, or child configuration failure.
    StartFailed,
    /// Orderly stop requested.
    Stop,
    /// Child exited with the given code.
    Exited(i32),
    /// Child was killed by the given signal.
    Signaled(i32),
    /// Operator disabled the job.
    Disable,
    /// The manifest was replaced by a re-import.
    Reimport,
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateChange::Load => write!(f, "load"),
            StateChange::Start => write!(f, "start"),
            StateChange::Exec => write!(f, "exec"),
            StateChange::StartFailed => write!(f, "start-failed"),
            StateChange::Stop => write!(f, "stop"),
            StateChange::Exited(code) => write!(f, "exited({code})"),
            StateChange::Signaled(sig) => write!(f, "signaled({sig})"),
            StateChange::Disable => write!(f, "disable"),
            StateChange::Reimport => write!(f, "reimport"),
        }
    }
}

/// A transition outside the permitted table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("illegal transition: {change} in state {from}")]
pub struct TransitionError {
    pub from: JobState,
    pub change: StateChange,
}

impl JobState {
    /// Apply a state change, returning the successor state.
    ///
    /// `keep_alive` rewriting (Running → Starting on abnormal exit) is
    /// the supervisor's concern; this table is the raw machine.
    pub fn transition(self, change: StateChange) -> Result<JobState, TransitionError> {
        use JobState::*;
        use StateChange::*;

        // Disable is accepted in every state; the supervisor force-kills
        // a live child before applying it.
        if change == Disable {
            return Ok(Stopped);
        }

        match (self, change) {
            (Unknown, Load) => Ok(Stopped),
            (Stopped, Start) => Ok(Starting),
            (Starting, Exec) => Ok(Running),
            (Starting, StartFailed) => Ok(Error),
            (Running, Stop) => Ok(Stopping),
            (Running, Exited(0)) => Ok(Stopped),
            (Running, Exited(_)) => Ok(Error),
            (Running, Signaled(_)) => Ok(Error),
            (Stopping, Exited(_)) | (Stopping, Signaled(_)) => Ok(Stopped),
            (Error, Reimport) => Ok(Stopped),
            (from, change) => Err(TransitionError { from, change }),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;

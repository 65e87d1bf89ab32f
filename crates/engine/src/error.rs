// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the solver and supervisor.

use jobd_core::{JobLabel, JobState, Pid, RowId, TransitionError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The dependency graph could not be fully sequenced.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("dependency cycle involving: {}", labels(members))]
    CycleDetected { members: Vec<JobLabel> },
}

fn labels(members: &[JobLabel]) -> String {
    members
        .iter()
        .map(JobLabel::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A start attempt failed. Variants name the precondition or the
/// configuration step that gave out.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("job {0} is disabled")]
    Disabled(JobLabel),

    #[error("job {label} is {state}, not stopped")]
    NotStopped { label: JobLabel, state: JobState },

    #[error("job {label} is waiting on predecessor {predecessor}")]
    PredecessorNotRunning {
        label: JobLabel,
        predecessor: JobLabel,
    },

    #[error("exclusive job {holder} is already running")]
    ExclusiveConflict { holder: JobLabel },

    #[error("no job with row id {0}")]
    UnknownRow(RowId),

    #[error("credential resolution failed: {0}")]
    Credentials(String),

    #[error("cannot redirect to {path}: {source}")]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed environment entry {0:?}")]
    Environment(String),

    /// Fork failed, or a child-side step (chroot, chdir, umask,
    /// credential switch) reported through the spawn error channel.
    #[error("spawn failed: {0}")]
    Spawn(#[from] io::Error),

    #[error(transparent)]
    Register(#[from] jobd_catalog::CatalogError),
}

/// Errors from event handling and lifecycle operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Catalog(#[from] jobd_catalog::CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("no job for pid {0}")]
    UnknownPid(Pid),

    #[error("no job with row id {0}")]
    UnknownJob(RowId),

    #[error("job {label} ignored SIGTERM past the grace period")]
    StopTimedOut { label: JobLabel },
}

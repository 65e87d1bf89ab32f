// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job status records in the runtime directory.
//!
//! One `<id>.json` per job, rewritten on every lifecycle change. The
//! field names are a wire format shared with status-file consumers;
//! do not rename them.

use jobd_core::{JobLabel, Pid};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Contents of one status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(rename = "JobStatusAPI")]
    pub api: u32,
    #[serde(rename = "Pid")]
    pub pid: i32,
    #[serde(rename = "LastExitStatus")]
    pub last_exit_status: i32,
    #[serde(rename = "TermSignal")]
    pub term_signal: i32,
    #[serde(rename = "Label")]
    pub label: String,
}

impl JobStatus {
    /// Fresh record for a job with no process history.
    pub fn new(label: &JobLabel) -> Self {
        Self {
            api: 0,
            pid: 0,
            last_exit_status: 0,
            term_signal: 0,
            label: label.to_string(),
        }
    }

    pub fn with_pid(mut self, pid: Pid) -> Self {
        self.pid = pid.as_i32();
        self
    }

    pub fn exited(mut self, code: i32) -> Self {
        self.pid = 0;
        self.last_exit_status = code;
        self.term_signal = 0;
        self
    }

    pub fn signaled(mut self, signum: i32) -> Self {
        self.pid = 0;
        self.last_exit_status = 0;
        self.term_signal = signum;
        self
    }
}

/// The supervisor's runtime directory of status records.
#[derive(Debug, Clone)]
pub struct StatusDir {
    dir: PathBuf,
}

impl StatusDir {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write a record. Write-then-rename keeps readers from observing a
    /// half-written file.
    pub fn write(&self, status: &JobStatus) -> io::Result<()> {
        let target = self.record_path(&status.label);
        let tmp = target.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(status)?)?;
        std::fs::rename(&tmp, &target)?;
        Ok(())
    }

    pub fn read(&self, label: &JobLabel) -> io::Result<JobStatus> {
        let bytes = std::fs::read(self.record_path(label.as_str()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Drop the record for a deleted job. Missing files are fine.
    pub fn remove(&self, label: &JobLabel) -> io::Result<()> {
        match std::fs::remove_file(self.record_path(label.as_str())) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn record_path(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.json"))
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;

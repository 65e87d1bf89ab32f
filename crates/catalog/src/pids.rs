// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The volatile pid table.
//!
//! A registration exists exactly while the corresponding child process
//! does. Recording a terminal outcome and deleting the registration is
//! one transaction, so a reader sees either the live pid or the final
//! status, never a mix.

use crate::error::CatalogError;
use crate::store::Catalog;
use jobd_core::{JobLabel, Pid, RowId};
use rusqlite::{params, OptionalExtension};

impl Catalog {
    /// Record a freshly forked child. At most one live pid per row.
    pub fn register_pid(&mut self, row_id: RowId, pid: Pid) -> Result<(), CatalogError> {
        let tx = self.conn_mut().transaction()?;
        let live: Option<i64> = tx
            .query_row(
                "SELECT pid FROM job_pids WHERE row_id = ?1",
                params![row_id.as_i64()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(live) = live {
            return Err(CatalogError::AlreadyRegistered {
                row_id,
                pid: Pid(live as i32),
            });
        }
        tx.execute(
            "INSERT INTO job_pids (row_id, pid, started_at) VALUES (?1, ?2, ?3)",
            params![
                row_id.as_i64(),
                pid.as_i32(),
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Live pid of a job, if any.
    pub fn get_pid(&self, row_id: RowId) -> Result<Option<Pid>, CatalogError> {
        let pid: Option<i32> = self
            .conn()
            .query_row(
                "SELECT pid FROM job_pids WHERE row_id = ?1",
                params![row_id.as_i64()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(pid.map(Pid))
    }

    /// Map a kernel-reported pid back to its job label.
    pub fn get_label_by_pid(&self, pid: Pid) -> Result<Option<JobLabel>, CatalogError> {
        let label: Option<String> = self
            .conn()
            .query_row(
                "SELECT jobs.id FROM job_pids JOIN jobs USING (row_id)
                 WHERE job_pids.pid = ?1",
                params![pid.as_i32()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(label.map(JobLabel::from))
    }

    /// Record a normal exit and drop the registration.
    pub fn set_exit_status(&mut self, pid: Pid, code: i32) -> Result<RowId, CatalogError> {
        self.finish_pid(pid, Some(code), None)
    }

    /// Record death-by-signal and drop the registration.
    pub fn set_signal_status(&mut self, pid: Pid, signum: i32) -> Result<RowId, CatalogError> {
        self.finish_pid(pid, None, Some(signum))
    }

    /// All current registrations. At supervisor startup these are the
    /// leftovers of a previous run, presumed dead.
    pub fn live_pids(&self) -> Result<Vec<(RowId, Pid)>, CatalogError> {
        let mut stmt = self
            .conn()
            .prepare("SELECT row_id, pid FROM job_pids ORDER BY row_id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((RowId(row.get::<_, i64>(0)?), Pid(row.get::<_, i32>(1)?)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Truncate the volatile table. Runs once at supervisor startup,
    /// before any child event is accepted.
    pub fn clear_pids(&self) -> Result<usize, CatalogError> {
        let n = self.conn().execute("DELETE FROM job_pids", [])?;
        if n > 0 {
            tracing::warn!(stale = n, "cleared stale pid registrations");
        }
        Ok(n)
    }

    fn finish_pid(
        &mut self,
        pid: Pid,
        code: Option<i32>,
        signum: Option<i32>,
    ) -> Result<RowId, CatalogError> {
        let tx = self.conn_mut().transaction()?;
        let row_id: Option<i64> = tx
            .query_row(
                "SELECT row_id FROM job_pids WHERE pid = ?1",
                params![pid.as_i32()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(row_id) = row_id else {
            return Err(CatalogError::NotFound(format!("pid {pid}")));
        };
        tx.execute(
            "UPDATE jobs SET last_exit_status = ?2, term_signal = ?3 WHERE row_id = ?1",
            params![row_id, code, signum],
        )?;
        tx.execute("DELETE FROM job_pids WHERE pid = ?1", params![pid.as_i32()])?;
        tx.commit()?;
        Ok(RowId(row_id))
    }
}

#[cfg(test)]
#[path = "pids_tests.rs"]
mod tests;

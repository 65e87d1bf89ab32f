// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job and edge persistence.
//!
//! `insert` upserts by label and preserves the row id, so re-importing
//! an identical manifest is a no-op from the solver's point of view.
//! Dependency name lists are persisted verbatim; `job_edges` holds only
//! the pairs whose endpoints were known at insert time, and the solver
//! re-resolves from the lists so soft references bind late.

use crate::error::CatalogError;
use crate::schema;
use jobd_core::{Job, JobLabel, Manifest, RowId};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::{Path, PathBuf};

/// Handle on the catalog database. One writer at a time; readers open
/// with `read_only` and never block the writer.
#[derive(Debug)]
pub struct Catalog {
    conn: Connection,
    path: PathBuf,
}

impl Catalog {
    /// Initialize a new catalog file. Fails if the target exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let conn = schema::create(path)?;
        Ok(Self { conn, path: path.to_path_buf() })
    }

    /// Open an existing catalog.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let conn = schema::open(path, read_only)?;
        Ok(Self { conn, path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begin an import transaction. Dropping the handle without
    /// `commit` rolls back everything inserted through it.
    pub fn import(&mut self) -> Result<Import<'_>, CatalogError> {
        Ok(Import { tx: self.conn.transaction()? })
    }

    /// All jobs, ordered by label.
    pub fn select_all(&self) -> Result<Vec<Job>, CatalogError> {
        let mut stmt = self.conn.prepare("SELECT * FROM jobs ORDER BY id")?;
        let rows = stmt.query_map([], row_to_parts)?;

        let mut jobs = Vec::new();
        for row in rows {
            let (row_id, mut manifest) = row?;
            self.load_lists(row_id, &mut manifest)?;
            jobs.push(Job::new(row_id, manifest));
        }
        Ok(jobs)
    }

    /// Exact-match lookup by label.
    pub fn find_by_id(&self, label: &JobLabel) -> Result<Option<Job>, CatalogError> {
        let found = self
            .conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![label.as_str()],
                row_to_parts,
            )
            .optional()?;

        match found {
            None => Ok(None),
            Some((row_id, mut manifest)) => {
                self.load_lists(row_id, &mut manifest)?;
                Ok(Some(Job::new(row_id, manifest)))
            }
        }
    }

    /// Labels only, sorted. The cheap form of the list query.
    pub fn list_labels(&self) -> Result<Vec<JobLabel>, CatalogError> {
        let mut stmt = self.conn.prepare("SELECT id FROM jobs ORDER BY id")?;
        let labels = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|r| r.map(JobLabel::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(labels)
    }

    /// Materialized dependency edges, `(predecessor, successor)` pairs.
    pub fn edges(&self) -> Result<Vec<(JobLabel, JobLabel)>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT predecessor_id, successor_id FROM job_edges
             ORDER BY predecessor_id, successor_id",
        )?;
        let edges = stmt
            .query_map([], |row| {
                Ok((
                    JobLabel::from(row.get::<_, String>(0)?),
                    JobLabel::from(row.get::<_, String>(1)?),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    /// Last recorded terminal outcome for a job: `(exit_status, signal)`.
    pub fn terminal_status(
        &self,
        row_id: RowId,
    ) -> Result<(Option<i32>, Option<i32>), CatalogError> {
        self.conn
            .query_row(
                "SELECT last_exit_status, term_signal FROM jobs WHERE row_id = ?1",
                params![row_id.as_i64()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| CatalogError::NotFound(format!("job row {row_id}")))
    }

    /// Persist the enable flag outside an import (enable/disable ops).
    pub fn set_enabled(&self, row_id: RowId, enabled: bool) -> Result<(), CatalogError> {
        let n = self.conn.execute(
            "UPDATE jobs SET enable = ?2 WHERE row_id = ?1",
            params![row_id.as_i64(), enabled],
        )?;
        if n == 0 {
            return Err(CatalogError::NotFound(format!("job row {row_id}")));
        }
        Ok(())
    }

    /// Remove a job, its child rows, and every edge touching it.
    pub fn delete(&mut self, label: &JobLabel) -> Result<(), CatalogError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM job_edges WHERE predecessor_id = ?1 OR successor_id = ?1",
            params![label.as_str()],
        )?;
        let n = tx.execute("DELETE FROM jobs WHERE id = ?1", params![label.as_str()])?;
        if n == 0 {
            return Err(CatalogError::NotFound(format!("job {label}")));
        }
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn load_lists(&self, row_id: RowId, manifest: &mut Manifest) -> Result<(), CatalogError> {
        manifest.environment_variables = self.list_values(row_id, "job_env")?;
        manifest.options = self.list_values(row_id, "job_options")?;
        manifest.before = self
            .list_values(row_id, "job_before")?
            .into_iter()
            .map(JobLabel::from)
            .collect();
        manifest.after = self
            .list_values(row_id, "job_after")?
            .into_iter()
            .map(JobLabel::from)
            .collect();
        Ok(())
    }

    fn list_values(&self, row_id: RowId, table: &str) -> Result<Vec<String>, CatalogError> {
        // Table names come from the fixed set above, never from input.
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT value FROM {table} WHERE row_id = ?1 ORDER BY ordinal"
        ))?;
        let values = stmt
            .query_map(params![row_id.as_i64()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    }
}

/// An open import transaction.
pub struct Import<'c> {
    tx: Transaction<'c>,
}

impl Import<'_> {
    /// Upsert a manifest by label. An existing row keeps its `row_id`;
    /// child rows and edges are replaced.
    pub fn insert(&self, manifest: &Manifest) -> Result<RowId, CatalogError> {
        let label = manifest.id.as_str();
        let existing: Option<i64> = self
            .tx
            .query_row(
                "SELECT row_id FROM jobs WHERE id = ?1",
                params![label],
                |row| row.get(0),
            )
            .optional()?;

        let m = manifest;
        let row_id = match existing {
            Some(row_id) => {
                self.tx.execute(
                    "UPDATE jobs SET command = ?2, description = ?3, enable = ?4,
                        exclusive = ?5, keep_alive = ?6, title = ?7,
                        root_directory = ?8, working_directory = ?9,
                        standard_in_path = ?10, standard_out_path = ?11,
                        standard_err_path = ?12, umask = ?13, uid = ?14, gid = ?15,
                        user_name = ?16, group_name = ?17, init_groups = ?18
                     WHERE row_id = ?1",
                    params![
                        row_id,
                        m.command,
                        m.description,
                        m.enable,
                        m.exclusive,
                        m.keep_alive,
                        m.title,
                        path_str(&m.root_directory),
                        path_str(&m.working_directory),
                        path_str(&m.standard_in_path),
                        path_str(&m.standard_out_path),
                        path_str(&m.standard_err_path),
                        m.umask,
                        m.uid,
                        m.gid,
                        m.user_name,
                        m.group_name,
                        m.init_groups,
                    ],
                )?;
                for table in ["job_env", "job_options", "job_before", "job_after"] {
                    self.tx.execute(
                        &format!("DELETE FROM {table} WHERE row_id = ?1"),
                        params![row_id],
                    )?;
                }
                RowId(row_id)
            }
            None => {
                self.tx.execute(
                    "INSERT INTO jobs (id, command, description, enable, exclusive,
                        keep_alive, title, root_directory, working_directory,
                        standard_in_path, standard_out_path, standard_err_path,
                        umask, uid, gid, user_name, group_name, init_groups)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                        ?13, ?14, ?15, ?16, ?17, ?18)",
                    params![
                        label,
                        m.command,
                        m.description,
                        m.enable,
                        m.exclusive,
                        m.keep_alive,
                        m.title,
                        path_str(&m.root_directory),
                        path_str(&m.working_directory),
                        path_str(&m.standard_in_path),
                        path_str(&m.standard_out_path),
                        path_str(&m.standard_err_path),
                        m.umask,
                        m.uid,
                        m.gid,
                        m.user_name,
                        m.group_name,
                        m.init_groups,
                    ],
                )?;
                RowId(self.tx.last_insert_rowid())
            }
        };

        self.insert_list(row_id, "job_env", &manifest.environment_variables)?;
        self.insert_list(row_id, "job_options", &manifest.options)?;
        let before: Vec<String> = manifest.before.iter().map(|l| l.to_string()).collect();
        let after: Vec<String> = manifest.after.iter().map(|l| l.to_string()).collect();
        self.insert_list(row_id, "job_before", &before)?;
        self.insert_list(row_id, "job_after", &after)?;

        self.refresh_edges(&manifest.id)?;
        tracing::debug!(job = label, row_id = row_id.as_i64(), "inserted manifest");
        Ok(row_id)
    }

    /// Commit everything inserted through this handle.
    pub fn commit(self) -> Result<(), CatalogError> {
        self.tx.commit()?;
        Ok(())
    }

    fn insert_list(&self, row_id: RowId, table: &str, values: &[String]) -> Result<(), CatalogError> {
        let mut stmt = self.tx.prepare_cached(&format!(
            "INSERT INTO {table} (row_id, ordinal, value) VALUES (?1, ?2, ?3)"
        ))?;
        for (ordinal, value) in values.iter().enumerate() {
            stmt.execute(params![row_id.as_i64(), ordinal as i64, value])?;
        }
        Ok(())
    }

    /// Rebuild every materialized edge touching `label`: pairs from this
    /// job's own lists plus pairs other jobs' lists declare against it.
    /// References to labels not yet in the catalog are skipped here and
    /// bind at solve time instead.
    fn refresh_edges(&self, label: &JobLabel) -> Result<(), CatalogError> {
        let label = label.as_str();
        self.tx.execute(
            "DELETE FROM job_edges WHERE predecessor_id = ?1 OR successor_id = ?1",
            params![label],
        )?;

        // before: this job precedes the named job
        self.tx.execute(
            "INSERT OR IGNORE INTO job_edges (predecessor_id, successor_id)
             SELECT ?1, jb.value FROM job_before jb
               JOIN jobs owner ON owner.row_id = jb.row_id AND owner.id = ?1
               JOIN jobs target ON target.id = jb.value",
            params![label],
        )?;
        // after: the named job precedes this job
        self.tx.execute(
            "INSERT OR IGNORE INTO job_edges (predecessor_id, successor_id)
             SELECT ja.value, ?1 FROM job_after ja
               JOIN jobs owner ON owner.row_id = ja.row_id AND owner.id = ?1
               JOIN jobs target ON target.id = ja.value",
            params![label],
        )?;
        // other jobs naming this one in their lists
        self.tx.execute(
            "INSERT OR IGNORE INTO job_edges (predecessor_id, successor_id)
             SELECT owner.id, ?1 FROM job_before jb
               JOIN jobs owner ON owner.row_id = jb.row_id
             WHERE jb.value = ?1",
            params![label],
        )?;
        self.tx.execute(
            "INSERT OR IGNORE INTO job_edges (predecessor_id, successor_id)
             SELECT ?1, owner.id FROM job_after ja
               JOIN jobs owner ON owner.row_id = ja.row_id
             WHERE ja.value = ?1",
            params![label],
        )?;
        Ok(())
    }
}

fn path_str(path: &Option<std::path::PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.display().to_string())
}

/// Build `(RowId, Manifest)` from a `SELECT * FROM jobs` row. The
/// ordinal lists are loaded separately.
fn row_to_parts(row: &Row<'_>) -> rusqlite::Result<(RowId, Manifest)> {
    let manifest = Manifest {
        id: JobLabel::from(row.get::<_, String>("id")?),
        command: row.get("command")?,
        description: row.get("description")?,
        enable: row.get("enable")?,
        exclusive: row.get("exclusive")?,
        keep_alive: row.get("keep_alive")?,
        environment_variables: Vec::new(),
        uid: row.get("uid")?,
        gid: row.get("gid")?,
        user_name: row.get("user_name")?,
        group_name: row.get("group_name")?,
        init_groups: row.get("init_groups")?,
        umask: row.get("umask")?,
        root_directory: row.get::<_, Option<String>>("root_directory")?.map(Into::into),
        working_directory: row
            .get::<_, Option<String>>("working_directory")?
            .map(Into::into),
        standard_in_path: row
            .get::<_, Option<String>>("standard_in_path")?
            .map(Into::into),
        standard_out_path: row
            .get::<_, Option<String>>("standard_out_path")?
            .map(Into::into),
        standard_err_path: row
            .get::<_, Option<String>>("standard_err_path")?
            .map(Into::into),
        title: row.get("title")?,
        before: Vec::new(),
        after: Vec::new(),
        options: Vec::new(),
    };
    Ok((RowId(row.get::<_, i64>("row_id")?), manifest))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

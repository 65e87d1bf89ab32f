// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency solve sessions.
//!
//! A [`Solve`] is built over a snapshot of the job table and sequences
//! one start pass: jobs with no unsatisfied predecessors come out of
//! `take_ready` in label order, and each `mark_running` releases its
//! dependents. Every enabled job is yielded at most once per session.
//!
//! Edges are resolved from the persisted `before`/`after` name lists at
//! session build time, so references that were dangling at import bind
//! here once the named job exists. Names that never resolve contribute
//! no edge.

use jobd_core::{Job, JobLabel, JobState, RowId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One start-ordering pass over the catalog.
#[derive(Debug)]
pub struct Solve {
    /// Unsatisfied incoming-edge count per not-yet-running job.
    counts: HashMap<RowId, usize>,
    /// predecessor → successors, both sides resolved.
    dependents: HashMap<RowId, Vec<RowId>>,
    /// Jobs depending on themselves; one-node cycles.
    self_loops: HashSet<RowId>,
    /// Enabled, stopped, zero-count jobs not yet yielded; keyed by
    /// label for the lexicographic tie-break.
    ready: BTreeMap<JobLabel, RowId>,
    /// Jobs already yielded by `take_ready`.
    visited: HashSet<RowId>,
    /// Jobs eligible to become ready (enabled and stopped at build).
    pending: HashSet<RowId>,
    labels: HashMap<RowId, JobLabel>,
}

impl Solve {
    /// Build a session from the current job table.
    ///
    /// Predecessors that are already Running count as satisfied. Jobs
    /// in any state other than Stopped, and disabled jobs, are never
    /// yielded, but their outgoing edges still gate their dependents.
    pub fn new(jobs: &BTreeMap<RowId, Job>) -> Self {
        let by_label: HashMap<&JobLabel, RowId> =
            jobs.values().map(|j| (j.label(), j.row_id)).collect();

        let mut edges: HashSet<(RowId, RowId)> = HashSet::new();
        for job in jobs.values() {
            for named in &job.manifest.before {
                if let Some(&succ) = by_label.get(named) {
                    edges.insert((job.row_id, succ));
                }
            }
            for named in &job.manifest.after {
                if let Some(&pred) = by_label.get(named) {
                    edges.insert((pred, job.row_id));
                }
            }
        }

        let mut counts: HashMap<RowId, usize> = HashMap::new();
        let mut dependents: HashMap<RowId, Vec<RowId>> = HashMap::new();
        let mut self_loops: HashSet<RowId> = HashSet::new();
        for &(pred, succ) in &edges {
            if pred == succ {
                self_loops.insert(succ);
                *counts.entry(succ).or_insert(0) += 1;
                continue;
            }
            dependents.entry(pred).or_default().push(succ);
            let satisfied = jobs
                .get(&pred)
                .is_some_and(|p| p.state == JobState::Running);
            if !satisfied {
                *counts.entry(succ).or_insert(0) += 1;
            }
        }

        let pending: HashSet<RowId> = jobs
            .values()
            .filter(|j| j.manifest.enable && j.state == JobState::Stopped)
            .map(|j| j.row_id)
            .collect();

        let ready = pending
            .iter()
            .filter(|row| counts.get(row).copied().unwrap_or(0) == 0)
            .map(|&row| (jobs[&row].label().clone(), row))
            .collect();

        let labels = jobs
            .values()
            .map(|j| (j.row_id, j.label().clone()))
            .collect();

        Self {
            counts,
            dependents,
            self_loops,
            ready,
            visited: HashSet::new(),
            pending,
            labels,
        }
    }

    /// Yield the currently startable jobs in label order, marking them
    /// visited. Returns an empty vec once the session has no more
    /// progress to offer (settled, or waiting on `mark_running`).
    pub fn take_ready(&mut self) -> Vec<RowId> {
        let batch: Vec<RowId> = std::mem::take(&mut self.ready).into_values().collect();
        self.visited.extend(&batch);
        batch
    }

    /// Record that a job reached Running; its dependents' counts drop,
    /// and any that hit zero become ready (if still pending).
    pub fn mark_running(&mut self, row_id: RowId) {
        let Some(successors) = self.dependents.get(&row_id) else {
            return;
        };
        for &succ in successors {
            let Some(count) = self.counts.get_mut(&succ) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && self.pending.contains(&succ) && !self.visited.contains(&succ) {
                if let Some(label) = self.labels.get(&succ) {
                    self.ready.insert(label.clone(), succ);
                }
            }
        }
    }

    /// Jobs this session will never start because they sit in (or
    /// behind) a dependency cycle, in label order.
    ///
    /// Pending jobs whose unsatisfied predecessors all lie outside the
    /// pending set are merely blocked (behind a disabled or failed
    /// job) and are not reported here.
    pub fn cycle_members(&self) -> Vec<RowId> {
        // The stuck set: pending, unvisited, count still positive.
        let mut stuck: HashSet<RowId> = self
            .pending
            .iter()
            .filter(|row| {
                !self.visited.contains(row) && self.counts.get(row).copied().unwrap_or(0) > 0
            })
            .copied()
            .collect();

        // Repeatedly trim nodes with no predecessor inside the stuck
        // set. What survives is in a cycle, or downstream of one.
        loop {
            let trimmed: Vec<RowId> = stuck
                .iter()
                .filter(|&&row| !self.self_loops.contains(&row))
                .filter(|&&row| {
                    !self
                        .dependents
                        .iter()
                        .any(|(pred, succs)| stuck.contains(pred) && succs.contains(&row))
                })
                .copied()
                .collect();
            if trimmed.is_empty() {
                break;
            }
            for row in trimmed {
                stuck.remove(&row);
            }
        }

        let mut members: Vec<RowId> = stuck.into_iter().collect();
        members.sort_by_key(|row| self.labels.get(row).cloned());
        members
    }

    /// True once every pending job was yielded.
    pub fn is_settled(&self) -> bool {
        self.pending.iter().all(|row| self.visited.contains(row))
    }

    pub fn label_of(&self, row_id: RowId) -> Option<&JobLabel> {
        self.labels.get(&row_id)
    }
}

#[cfg(test)]
#[path = "solver_tests.rs"]
mod tests;

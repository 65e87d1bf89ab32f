// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle orchestration.
//!
//! The supervisor owns the in-memory job table and applies events from
//! the daemon loop: child exits, timer expiries, shutdown. All state
//! lives on one task; the only parallelism is the children themselves
//! and their waiter tasks, which do nothing but forward exit events.

use crate::error::{SolveError, StartError, SupervisorError};
use crate::registry::PidRegistry;
use crate::scheduler::Scheduler;
use crate::solver::Solve;
use crate::spawn;
use crate::status::{JobStatus, StatusDir};
use jobd_catalog::{Catalog, CatalogError};
use jobd_core::{Event, Job, JobLabel, JobState, Pid, RowId, StateChange, TimerKind};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How long a stopping child gets between SIGTERM and SIGKILL.
pub const STOP_GRACE_DEFAULT: Duration = Duration::from_secs(10);

/// Outcome of one solve pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SolveReport {
    /// Jobs forked by this pass.
    pub started: usize,
    /// Labels moved to Error because they sit in (or behind) a cycle.
    pub cycle: Vec<JobLabel>,
}

/// The process-supervision engine.
#[derive(Debug)]
pub struct Supervisor {
    catalog: Catalog,
    jobs: BTreeMap<RowId, Job>,
    by_label: HashMap<JobLabel, RowId>,
    registry: PidRegistry,
    scheduler: Arc<Mutex<Scheduler>>,
    status: StatusDir,
    event_tx: mpsc::Sender<Event>,
    solve: Option<Solve>,
    /// Exclusive jobs released by the solver but waiting for the
    /// running exclusive job to leave.
    deferred_exclusive: BTreeMap<JobLabel, RowId>,
    shutting_down: bool,
    stop_grace: Duration,
}

impl Supervisor {
    /// Take ownership of the catalog: truncate the volatile pid table,
    /// load every job to Stopped, and schedule restarts for keep_alive
    /// jobs whose previous process is presumed dead.
    pub fn new(
        mut catalog: Catalog,
        runtime_dir: &Path,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<Self, SupervisorError> {
        let stale = catalog.live_pids()?;
        catalog.clear_pids()?;

        let status = StatusDir::new(runtime_dir)?;
        let scheduler = Arc::new(Mutex::new(Scheduler::new()));

        let mut jobs = BTreeMap::new();
        let mut by_label = HashMap::new();
        for mut job in catalog.select_all()? {
            job.apply(StateChange::Load)?;
            status.write(&JobStatus::new(job.label()))?;
            by_label.insert(job.label().clone(), job.row_id);
            jobs.insert(job.row_id, job);
        }

        let now = Instant::now();
        for (row_id, pid) in stale {
            let Some(job) = jobs.get_mut(&row_id) else {
                continue;
            };
            debug!(job = %job.label(), %pid, "previous child presumed dead");
            if job.manifest.keep_alive && job.manifest.enable {
                job.apply(StateChange::Start)?;
                scheduler.lock().set_timer(
                    TimerKind::Restart(row_id),
                    job.manifest.restart_after(),
                    now,
                );
            }
        }

        Ok(Self {
            catalog,
            jobs,
            by_label,
            registry: PidRegistry::new(),
            scheduler,
            status,
            event_tx,
            solve: None,
            deferred_exclusive: BTreeMap::new(),
            shutting_down: false,
            stop_grace: STOP_GRACE_DEFAULT,
        })
    }

    /// Override the SIGTERM → SIGKILL grace period.
    pub fn set_stop_grace(&mut self, grace: Duration) {
        self.stop_grace = grace;
    }

    /// Shared handle for the daemon loop's deadline calculation.
    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn status_dir(&self) -> &StatusDir {
        &self.status
    }

    pub fn row_of(&self, label: &JobLabel) -> Option<RowId> {
        self.by_label.get(label).copied()
    }

    pub fn state_of(&self, label: &JobLabel) -> Option<JobState> {
        self.row_of(label).and_then(|r| self.jobs.get(&r)).map(|j| j.state)
    }

    pub fn restarts_of(&self, label: &JobLabel) -> u32 {
        self.row_of(label)
            .and_then(|r| self.jobs.get(&r))
            .map(|j| j.restarts)
            .unwrap_or(0)
    }

    pub fn pid_of(&self, label: &JobLabel) -> Option<Pid> {
        self.row_of(label).and_then(|r| self.registry.pid_of(r))
    }

    pub fn live_children(&self) -> usize {
        self.registry.len()
    }

    /// Snapshot of `(label, state)` pairs, sorted by label.
    pub fn list(&self) -> Vec<(JobLabel, JobState)> {
        let mut rows: Vec<_> = self
            .jobs
            .values()
            .map(|j| (j.label().clone(), j.state))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Run one solve pass: start everything startable in dependency
    /// order, mark cycle members Error, and report.
    pub fn solve_and_start(&mut self) -> Result<SolveReport, SupervisorError> {
        self.solve = Some(Solve::new(&self.jobs));
        let mut report = SolveReport {
            started: self.drain_solve(),
            cycle: Vec::new(),
        };

        let members = match self.solve.as_ref() {
            Some(solve) => solve.cycle_members(),
            None => Vec::new(),
        };
        if !members.is_empty() {
            for row_id in &members {
                if let Some(job) = self.jobs.get_mut(row_id) {
                    job.state = JobState::Error;
                    report.cycle.push(job.label().clone());
                }
            }
            error!(
                error = %SolveError::CycleDetected { members: report.cycle.clone() },
                "dependency graph is not a DAG"
            );
        }
        Ok(report)
    }

    /// Start whatever the active solve session has released, until it
    /// offers nothing more. Returns the number of jobs forked.
    fn drain_solve(&mut self) -> usize {
        let mut started = 0;
        loop {
            let batch = match self.solve.as_mut() {
                Some(solve) => solve.take_ready(),
                None => return started,
            };
            if batch.is_empty() {
                return started;
            }
            for row_id in batch {
                match self.start(row_id) {
                    Ok(()) => started += 1,
                    Err(StartError::ExclusiveConflict { holder }) => {
                        if let Some(job) = self.jobs.get(&row_id) {
                            let label = job.label().clone();
                            info!(job = %label, %holder, "deferred behind exclusive job");
                            self.deferred_exclusive.insert(label, row_id);
                        }
                    }
                    Err(err) => {
                        // Job is already Error (start() applied StartFailed);
                        // the solve continues without releasing dependents.
                        if let Some(job) = self.jobs.get(&row_id) {
                            error!(job = %job.label(), error = %err, "start failed");
                        }
                    }
                }
            }
        }
    }

    /// Start one job. Preconditions: enabled, Stopped, predecessors
    /// Running, no exclusive conflict.
    pub fn start(&mut self, row_id: RowId) -> Result<(), StartError> {
        let job = self.jobs.get(&row_id).ok_or(StartError::UnknownRow(row_id))?;
        let label = job.label().clone();

        if !job.manifest.enable {
            return Err(StartError::Disabled(label));
        }
        if job.state != JobState::Stopped {
            return Err(StartError::NotStopped { label, state: job.state });
        }
        if let Some(predecessor) = self.waiting_predecessor(row_id) {
            return Err(StartError::PredecessorNotRunning { label, predecessor });
        }
        if job.manifest.exclusive {
            if let Some(holder) = self.exclusive_holder(row_id) {
                return Err(StartError::ExclusiveConflict { holder });
            }
        }

        if let Some(job) = self.jobs.get_mut(&row_id) {
            // Stopped → Starting; infallible given the check above.
            let _ = job.apply(StateChange::Start);
        }
        self.fork(row_id)
    }

    /// Fork the child for a job already in Starting. On failure the job
    /// lands in Error.
    fn fork(&mut self, row_id: RowId) -> Result<(), StartError> {
        let result = self.try_fork(row_id);
        if result.is_err() {
            if let Some(job) = self.jobs.get_mut(&row_id) {
                let _ = job.apply(StateChange::StartFailed);
                let record = JobStatus::new(job.label());
                if let Err(e) = self.status.write(&record) {
                    warn!(job = %job.label(), error = %e, "status write failed");
                }
            }
        }
        result
    }

    fn try_fork(&mut self, row_id: RowId) -> Result<(), StartError> {
        let job = self.jobs.get(&row_id).ok_or(StartError::UnknownRow(row_id))?;
        let (manifest, label) = (job.manifest.clone(), job.label().clone());

        let identity = spawn::resolve_identity(&manifest)?;
        let (child, pid) = spawn::spawn_job(&manifest, &identity)?;

        // register_pid happens-before any exit event for this pid can
        // be dispatched: the waiter task is only spawned below.
        if let Err(CatalogError::AlreadyRegistered { pid: stale, .. }) =
            self.catalog.register_pid(row_id, pid)
        {
            // A lost exit event left a stale registration; synthesize
            // the exit and retry.
            warn!(job = %label, %stale, "stale pid registration, synthesizing exit");
            let _ = self.catalog.set_exit_status(stale, 1);
            self.registry.remove_pid(stale);
            self.catalog.register_pid(row_id, pid)?;
        }
        if let Err(conflict) = self.registry.insert(row_id, pid) {
            self.registry.remove_pid(conflict.pid);
            let _ = self.registry.insert(row_id, pid);
        }

        if let Some(job) = self.jobs.get_mut(&row_id) {
            let _ = job.apply(StateChange::Exec);
        }
        if let Err(e) = self.status.write(&JobStatus::new(&label).with_pid(pid)) {
            warn!(job = %label, error = %e, "status write failed");
        }
        info!(job = %label, %pid, "running");

        if let Some(solve) = self.solve.as_mut() {
            solve.mark_running(row_id);
        }

        let tx = self.event_tx.clone();
        tokio::spawn(wait_child(child, pid, tx));
        Ok(())
    }

    /// Apply one event from the daemon loop.
    pub fn handle_event(&mut self, event: Event) -> Result<(), SupervisorError> {
        match event {
            Event::ChildExited { pid, code } => {
                self.child_terminated(pid, StateChange::Exited(code))
            }
            Event::ChildSignaled { pid, signum } => {
                self.child_terminated(pid, StateChange::Signaled(signum))
            }
            Event::Timer(TimerKind::Restart(row_id)) => self.restart_due(row_id),
            Event::Timer(TimerKind::StopGrace(row_id)) => self.grace_expired(row_id),
            Event::Shutdown => {
                self.begin_shutdown();
                Ok(())
            }
        }
    }

    /// Drain and handle all due timers.
    pub fn check_timers(&mut self, now: Instant) -> Result<(), SupervisorError> {
        let fired = self.scheduler.lock().fired_timers(now);
        for event in fired {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn child_terminated(
        &mut self,
        pid: Pid,
        change: StateChange,
    ) -> Result<(), SupervisorError> {
        let Some(row_id) = self.registry.remove_pid(pid) else {
            warn!(%pid, "exit event for unregistered pid");
            return Ok(());
        };

        let outcome = match change {
            StateChange::Exited(code) => self.catalog.set_exit_status(pid, code).map(|_| ()),
            StateChange::Signaled(signum) => {
                self.catalog.set_signal_status(pid, signum).map(|_| ())
            }
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            warn!(%pid, error = %e, "catalog status update failed");
        }
        self.scheduler.lock().cancel_timer(TimerKind::StopGrace(row_id));

        let Some(job) = self.jobs.get_mut(&row_id) else {
            return Err(SupervisorError::UnknownJob(row_id));
        };
        let label = job.label().clone();

        let record = match change {
            StateChange::Signaled(signum) => JobStatus::new(&label).signaled(signum),
            StateChange::Exited(code) => JobStatus::new(&label).exited(code),
            _ => JobStatus::new(&label),
        };
        if let Err(e) = self.status.write(&record) {
            warn!(job = %label, error = %e, "status write failed");
        }

        let was_exclusive = job.manifest.exclusive;
        match job.state {
            JobState::Stopping => {
                job.apply(change)?;
                info!(job = %label, "stopped");
            }
            JobState::Running => {
                let restart = job.manifest.keep_alive
                    && job.manifest.enable
                    && !self.shutting_down;
                if restart {
                    // The landing state is rewritten to Starting; the
                    // actual fork happens when the restart timer fires.
                    job.state = JobState::Starting;
                    let delay = job.manifest.restart_after();
                    self.scheduler
                        .lock()
                        .set_timer(TimerKind::Restart(row_id), delay, Instant::now());
                    info!(job = %label, ?delay, ?change, "keep_alive restart scheduled");
                } else {
                    let next = job.apply(change)?;
                    match next {
                        JobState::Error => warn!(job = %label, %change, "job failed"),
                        _ => info!(job = %label, %change, "job finished"),
                    }
                }
            }
            other => {
                // Post-disable force-kill, or a synthesized exit; the
                // bookkeeping above is all that was left to do.
                debug!(job = %label, state = %other, "late exit event");
            }
        }

        if was_exclusive {
            self.start_deferred_exclusive();
        }
        Ok(())
    }

    fn restart_due(&mut self, row_id: RowId) -> Result<(), SupervisorError> {
        let Some(job) = self.jobs.get(&row_id) else {
            return Ok(());
        };
        if self.shutting_down || !job.manifest.enable || job.state != JobState::Starting {
            debug!(job = %job.label(), "stale restart timer ignored");
            return Ok(());
        }
        let label = job.label().clone();
        if job.manifest.exclusive {
            if let Some(holder) = self.exclusive_holder(row_id) {
                info!(job = %label, %holder, "restart deferred behind exclusive job");
                self.deferred_exclusive.insert(label.clone(), row_id);
                // Park in Stopped: a deferred job queues for the slot,
                // it must not read as holding it.
                if let Some(job) = self.jobs.get_mut(&row_id) {
                    job.state = JobState::Stopped;
                }
                return Ok(());
            }
        }

        match self.fork(row_id) {
            Ok(()) => {
                if let Some(job) = self.jobs.get_mut(&row_id) {
                    job.restarts += 1;
                }
                // A dependent parked since the original solve may have
                // been waiting on this job coming back.
                self.drain_solve();
                Ok(())
            }
            Err(err) => {
                error!(job = %label, error = %err, "restart failed");
                Ok(())
            }
        }
    }

    fn grace_expired(&mut self, row_id: RowId) -> Result<(), SupervisorError> {
        let Some(pid) = self.registry.pid_of(row_id) else {
            return Ok(());
        };
        if let Some(job) = self.jobs.get(&row_id) {
            warn!(
                error = %SupervisorError::StopTimedOut { label: job.label().clone() },
                "escalating to SIGKILL"
            );
        }
        self.kill(pid, Signal::SIGKILL);
        Ok(())
    }

    /// Orderly stop: the running dependent closure first (direct
    /// dependents before their own dependents), then the job itself.
    pub fn stop(&mut self, row_id: RowId) -> Result<(), SupervisorError> {
        if !self.jobs.contains_key(&row_id) {
            return Err(SupervisorError::UnknownJob(row_id));
        }
        for dependent in self.dependent_closure(row_id) {
            self.send_stop(dependent);
        }
        self.send_stop(row_id);
        Ok(())
    }

    /// Disable implies stop; a live child is force-killed.
    pub fn disable(&mut self, row_id: RowId) -> Result<(), SupervisorError> {
        let Some(job) = self.jobs.get_mut(&row_id) else {
            return Err(SupervisorError::UnknownJob(row_id));
        };
        let label = job.label().clone();
        self.catalog.set_enabled(row_id, false)?;
        job.manifest.enable = false;
        // Disable lands in Stopped from any state.
        job.apply(StateChange::Disable)?;

        self.scheduler.lock().cancel_job(row_id);
        self.deferred_exclusive.remove(&label);
        if let Some(pid) = self.registry.pid_of(row_id) {
            info!(job = %label, %pid, "force-killing disabled job");
            self.kill(pid, Signal::SIGKILL);
        }
        Ok(())
    }

    /// Re-enable a job. Starting is the next solve's business.
    pub fn enable(&mut self, row_id: RowId) -> Result<(), SupervisorError> {
        let Some(job) = self.jobs.get_mut(&row_id) else {
            return Err(SupervisorError::UnknownJob(row_id));
        };
        self.catalog.set_enabled(row_id, true)?;
        job.manifest.enable = true;
        Ok(())
    }

    /// Stop every job, dependents before dependencies. Exit events and
    /// grace timers drain through the normal loop; the daemon keeps
    /// pumping until `live_children` hits zero.
    pub fn begin_shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;
        self.deferred_exclusive.clear();
        info!("stopping all jobs in reverse start order");

        {
            let mut scheduler = self.scheduler.lock();
            for &row_id in self.jobs.keys() {
                scheduler.cancel_timer(TimerKind::Restart(row_id));
            }
        }
        for row_id in self.reverse_topo() {
            self.send_stop(row_id);
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    fn send_stop(&mut self, row_id: RowId) {
        let grace = self.stop_grace;
        let pid = self.registry.pid_of(row_id);
        let Some(job) = self.jobs.get_mut(&row_id) else {
            return;
        };
        match job.state {
            JobState::Running => {
                let _ = job.apply(StateChange::Stop);
                let label = job.label().clone();
                if let Some(pid) = pid {
                    info!(job = %label, %pid, "sending SIGTERM");
                    self.kill(pid, Signal::SIGTERM);
                    self.scheduler
                        .lock()
                        .set_timer(TimerKind::StopGrace(row_id), grace, Instant::now());
                }
            }
            JobState::Starting => {
                // Restart pending, nothing live: cancel and park.
                job.state = JobState::Stopped;
                self.scheduler.lock().cancel_timer(TimerKind::Restart(row_id));
            }
            _ => {}
        }
    }

    fn kill(&self, pid: Pid, signal: Signal) {
        let target = nix::unistd::Pid::from_raw(pid.as_i32());
        if let Err(errno) = nix::sys::signal::kill(target, signal) {
            // ESRCH just means the child beat us to the exit.
            debug!(%pid, %errno, "kill failed");
        }
    }

    /// First deferred exclusive job that can now run, if the slot freed.
    fn start_deferred_exclusive(&mut self) {
        while let Some((label, row_id)) = self
            .deferred_exclusive
            .iter()
            .map(|(l, r)| (l.clone(), *r))
            .next()
        {
            if self.exclusive_holder(row_id).is_some() {
                return;
            }
            self.deferred_exclusive.remove(&label);
            // Deferred jobs are parked in Stopped, whether they came
            // from the solver or from a held-off keep_alive restart.
            let state = self.jobs.get(&row_id).map(|j| j.state);
            let result = match state {
                Some(JobState::Stopped) => self.start(row_id).map_err(SupervisorError::Start),
                _ => Ok(()),
            };
            match result {
                Ok(()) => {
                    self.drain_solve();
                    return;
                }
                Err(err) => {
                    error!(job = %label, error = %err, "deferred exclusive start failed");
                    // try the next deferred job
                }
            }
        }
    }

    /// An exclusive job other than `row_id` currently holding the
    /// slot: Starting (which includes waiting out a keep_alive restart
    /// delay), Running, or still winding down in Stopping. Jobs queued
    /// in `deferred_exclusive` are parked in Stopped and never hold it.
    fn exclusive_holder(&self, row_id: RowId) -> Option<JobLabel> {
        self.jobs
            .values()
            .find(|j| {
                j.row_id != row_id
                    && j.manifest.exclusive
                    && matches!(
                        j.state,
                        JobState::Starting | JobState::Running | JobState::Stopping
                    )
            })
            .map(|j| j.label().clone())
    }

    /// A resolved predecessor not yet Running, if any.
    fn waiting_predecessor(&self, row_id: RowId) -> Option<JobLabel> {
        let preds = self.predecessors_of(row_id);
        preds.into_iter().find_map(|pred| {
            let job = self.jobs.get(&pred)?;
            (job.state != JobState::Running).then(|| job.label().clone())
        })
    }

    fn predecessors_of(&self, row_id: RowId) -> HashSet<RowId> {
        let mut preds = HashSet::new();
        let Some(job) = self.jobs.get(&row_id) else {
            return preds;
        };
        for named in &job.manifest.after {
            if let Some(&pred) = self.by_label.get(named) {
                if pred != row_id {
                    preds.insert(pred);
                }
            }
        }
        let label = job.label();
        for other in self.jobs.values() {
            if other.row_id != row_id && other.manifest.before.contains(label) {
                preds.insert(other.row_id);
            }
        }
        preds
    }

    fn successors_of(&self, row_id: RowId) -> Vec<RowId> {
        let Some(job) = self.jobs.get(&row_id) else {
            return Vec::new();
        };
        let label = job.label();
        let mut succs = HashSet::new();
        for named in &job.manifest.before {
            if let Some(&succ) = self.by_label.get(named) {
                if succ != row_id {
                    succs.insert(succ);
                }
            }
        }
        for other in self.jobs.values() {
            if other.row_id != row_id && other.manifest.after.contains(label) {
                succs.insert(other.row_id);
            }
        }
        let mut succs: Vec<RowId> = succs.into_iter().collect();
        succs.sort_by_key(|r| self.jobs.get(r).map(|j| j.label().clone()));
        succs
    }

    /// Transitive dependents in breadth-first order: direct dependents
    /// (label-sorted) before their own dependents.
    fn dependent_closure(&self, row_id: RowId) -> Vec<RowId> {
        let mut order = Vec::new();
        let mut seen = HashSet::from([row_id]);
        let mut frontier = vec![row_id];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for &row in &frontier {
                for succ in self.successors_of(row) {
                    if seen.insert(succ) {
                        order.push(succ);
                        next.push(succ);
                    }
                }
            }
            frontier = next;
        }
        order
    }

    /// Full topological start order, reversed: dependents first.
    fn reverse_topo(&self) -> Vec<RowId> {
        let mut incoming: HashMap<RowId, usize> = HashMap::new();
        for &row in self.jobs.keys() {
            incoming.insert(row, self.predecessors_of(row).len());
        }

        let mut ready: BTreeMap<JobLabel, RowId> = self
            .jobs
            .values()
            .filter(|j| incoming.get(&j.row_id) == Some(&0))
            .map(|j| (j.label().clone(), j.row_id))
            .collect();

        let mut order = Vec::new();
        let mut placed = HashSet::new();
        while let Some((_, row)) = ready.pop_first() {
            order.push(row);
            placed.insert(row);
            for succ in self.successors_of(row) {
                if let Some(count) = incoming.get_mut(&succ) {
                    *count = count.saturating_sub(1);
                    if *count == 0 && !placed.contains(&succ) {
                        if let Some(job) = self.jobs.get(&succ) {
                            ready.insert(job.label().clone(), succ);
                        }
                    }
                }
            }
        }
        // cycle members never place; append them so shutdown still
        // reaches anything live
        for job in self.jobs.values() {
            if !placed.contains(&job.row_id) {
                order.push(job.row_id);
            }
        }
        order.reverse();
        order
    }
}

/// The event pump for one child: waits, decodes the status, forwards.
async fn wait_child(mut child: Child, pid: Pid, tx: mpsc::Sender<Event>) {
    use std::os::unix::process::ExitStatusExt;
    let event = match child.wait().await {
        Ok(status) => match status.code() {
            Some(code) => Event::ChildExited { pid, code },
            None => Event::ChildSignaled {
                pid,
                signum: status.signal().unwrap_or(0),
            },
        },
        Err(e) => {
            error!(%pid, error = %e, "wait on child failed");
            Event::ChildExited { pid, code: -1 }
        }
    };
    // Send failure means the supervisor is gone; nothing to do.
    let _ = tx.send(event).await;
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

//! A fixed vector of per-worker private FIFOs, an admission check against
//! `max_pending` applied to the pool's *aggregate* pending count before
//! dispatch, and three named entry points (`execute`, `execute_least_loaded`,
//! `execute_hash_by_key`) rather than one polymorphic submit call.
//!
//! Admission uses `pending_task_count > max_pending_task_count` (strict
//! `>`), which admits one task beyond the configured bound before
//! rejecting — an effective capacity of `max_pending + 1`. A few callers
//! depend on being able to submit a bookkeeping task even when the queue
//! reads exactly at capacity, so this crate keeps that exact comparison
//! rather than normalizing to `>=`. See `DESIGN.md`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{PoolError, Result};
use crate::metrics::{NoopObserver, Observer};
use crate::pool::DispatchPolicy;
use crate::runner::Runner;
use crate::task::Task;
use crate::worker::Worker;

/// A fixed-size set of workers, each with its own private FIFO.
pub struct ExecqWorkerPool {
    name: String,
    workers: Vec<Worker>,
    max_pending: i64,
    default_policy: DispatchPolicy,
    observer: Arc<dyn Observer>,
    rr_cursor: AtomicUsize,
}

impl ExecqWorkerPool {
    /// Builds a pool of `worker_count` workers, each backed by `runner`,
    /// admitting submissions while aggregate pending stays within
    /// `max_pending` (see the module docs above for the exact boundary).
    pub fn new(
        name: impl Into<String>,
        worker_count: usize,
        max_pending: i64,
        default_policy: DispatchPolicy,
        runner: &dyn Runner,
    ) -> Self {
        let name = name.into();
        let observer: Arc<dyn Observer> = crate::metrics::PrometheusObserver::for_execq(&name);
        let workers = (0..worker_count.max(1))
            .map(|i| Worker::new(format!("{name}-{i}"), runner, observer.clone()))
            .collect();
        Self {
            name,
            workers,
            max_pending,
            default_policy,
            observer,
            rr_cursor: AtomicUsize::new(0),
        }
    }

    /// Builds a pool with no metrics observer, for tests that don't need
    /// the prometheus machinery.
    #[cfg(test)]
    pub fn new_unobserved(
        name: impl Into<String>,
        worker_count: usize,
        max_pending: i64,
        default_policy: DispatchPolicy,
        runner: &dyn Runner,
    ) -> Self {
        let name = name.into();
        let observer: Arc<dyn Observer> = Arc::new(NoopObserver);
        let workers = (0..worker_count.max(1))
            .map(|i| Worker::new(format!("{name}-{i}"), runner, observer.clone()))
            .collect();
        Self {
            name,
            workers,
            max_pending,
            default_policy,
            observer,
            rr_cursor: AtomicUsize::new(0),
        }
    }

    /// Pool name, used as the metric family's `<name>` segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Sum of each worker's pending count.
    pub fn pending_count(&self) -> i64 {
        self.workers.iter().map(Worker::pending_count).sum()
    }

    /// Sum of each worker's total-accepted count.
    pub fn total_count(&self) -> i64 {
        self.workers.iter().map(Worker::total_count).sum()
    }

    /// Trace strings for every pending task across all workers.
    pub fn pending_task_traces(&self) -> Vec<String> {
        self.workers
            .iter()
            .flat_map(Worker::pending_task_traces)
            .collect()
    }

    /// The `prometheus::Registry` backing this pool's metrics, for callers
    /// that want to scrape it directly. `None` if the pool was built
    /// without a real metrics sink (e.g. `new_unobserved` in tests).
    pub fn metrics_registry(&self) -> Option<&prometheus::Registry> {
        self.observer.registry()
    }

    fn check_admission(&self) -> Result<()> {
        let pending = self.pending_count();
        if pending > self.max_pending {
            self.observer.on_admission_rejected();
            tracing::warn!(pool = %self.name, pending, max_pending = self.max_pending, "admission rejected");
            return Err(PoolError::AdmissionRejected {
                pending,
                max_pending: self.max_pending,
            });
        }
        Ok(())
    }

    /// Dispatches using the pool's configured default policy.
    pub fn execute(&self, task: Task) -> Result<()> {
        match self.default_policy {
            DispatchPolicy::RoundRobin => self.execute_round_robin(task),
            DispatchPolicy::LeastLoaded => self.execute_least_loaded(task),
        }
    }

    /// Cycles workers in construction order.
    pub fn execute_round_robin(&self, task: Task) -> Result<()> {
        self.check_admission()?;
        let idx = self.rr_cursor.fetch_add(1, Ordering::SeqCst) % self.workers.len();
        let result = self.workers[idx].execute(task);
        if result.is_ok() {
            self.observer.on_task_added();
        }
        result
    }

    /// Picks the worker with the fewest currently-pending tasks, ties
    /// broken by index via a deterministic linear scan that keeps the
    /// first minimum found.
    pub fn execute_least_loaded(&self, task: Task) -> Result<()> {
        self.check_admission()?;
        let idx = self
            .workers
            .iter()
            .enumerate()
            .min_by_key(|(_, w)| w.pending_count())
            .map(|(i, _)| i)
            .expect("pool always has at least one worker");
        let result = self.workers[idx].execute(task);
        if result.is_ok() {
            self.observer.on_task_added();
        }
        result
    }

    /// Routes by `key % worker_count`, so repeated submissions with the
    /// same key always land on the same worker and observe that worker's
    /// FIFO order.
    pub fn execute_hash_by_key(&self, key: i64, task: Task) -> Result<()> {
        self.check_admission()?;
        let idx = (key.rem_euclid(self.workers.len() as i64)) as usize;
        let result = self.workers[idx].execute(task);
        if result.is_ok() {
            self.observer.on_task_added();
        }
        result
    }

    /// Destroys every worker. Idempotent via each worker's own guard.
    pub fn destroy(&self) {
        for w in &self.workers {
            w.destroy();
        }
    }
}

impl Drop for ExecqWorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

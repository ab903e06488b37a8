//! `SimpleWorkerPool`: one shared queue (FIFO or a priority heap, chosen
//! at construction) guarded by a mutex/condvar pair, drained by N runners
//! that block on the condvar when empty rather than polling. Latency
//! histograms (`queue_wait_latency`, `queue_run_latency`) are unique to
//! this pool — `ExecqWorkerPool`'s private-FIFO design has no single
//! queue to time wait-in-queue against.
//!
//! `pending_count()` is the only externally visible idleness signal: it
//! is decremented once a task finishes running, not once it's popped off
//! the queue. The drain loop's internal wake predicate queries the queue
//! directly rather than maintaining a second counter, so there is
//! exactly one source of truth for "is there more work" and one for "is
//! the pool idle".

use std::collections::{BinaryHeap, VecDeque};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::error::{PoolError, Result};
use crate::metrics::{NoopObserver, Observer};
use crate::runner::Runner;
use crate::task::Task;

/// Whether the shared queue behaves as a plain FIFO or a min-by-priority
/// heap, ordered by `priority_key`, smaller first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Insertion order.
    Fifo,
    /// `Task::priority_key` order, smallest first.
    Priority,
}

struct QueueItem {
    task: Task,
    enqueued_at: Instant,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.task == other.task
    }
}
impl Eq for QueueItem {}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.task.cmp(&other.task)
    }
}

enum QueueInner {
    Fifo(VecDeque<QueueItem>),
    Priority(BinaryHeap<QueueItem>),
}

impl QueueInner {
    fn push(&mut self, item: QueueItem) {
        match self {
            Self::Fifo(d) => d.push_back(item),
            Self::Priority(h) => h.push(item),
        }
    }

    fn pop(&mut self) -> Option<QueueItem> {
        match self {
            Self::Fifo(d) => d.pop_front(),
            Self::Priority(h) => h.pop(),
        }
    }
}

struct Inner {
    queue: Mutex<QueueInner>,
    condvar: Condvar,
    pending: AtomicI64,
    total: AtomicI64,
    traces: Mutex<HashMap<u64, String>>,
    destroyed: AtomicBool,
    observer: Arc<dyn Observer>,
    max_pending: i64,
}

impl Inner {
    fn pending_count(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        let item = {
            let mut guard = inner.queue.lock().unwrap();
            loop {
                if let Some(item) = guard.pop() {
                    break Some(item);
                }
                if inner.destroyed.load(Ordering::SeqCst) {
                    break None;
                }
                guard = inner.condvar.wait(guard).unwrap();
            }
        };
        let Some(item) = item else { break };
        let id = item.task.id();
        inner.observer.on_queue_wait(item.enqueued_at.elapsed());
        let run_start = Instant::now();
        item.task.run();
        inner.observer.on_queue_run(run_start.elapsed());
        inner.pending.fetch_sub(1, Ordering::SeqCst);
        inner.traces.lock().unwrap().remove(&id);
        inner.observer.on_task_finished();
    }
}

/// A shared-queue pool drained by `worker_count` runners.
pub struct SimpleWorkerPool {
    name: String,
    inner: Arc<Inner>,
    handles: Mutex<Vec<Box<dyn crate::runner::JoinOutcome>>>,
}

impl SimpleWorkerPool {
    /// Builds a pool with `worker_count` runners draining a shared queue
    /// in `mode`, admitting submissions while `pending_count() <=
    /// max_pending` (the same strict-`>` admission comparison used by
    /// `ExecqWorkerPool` applies here too).
    pub fn new(
        name: impl Into<String>,
        worker_count: usize,
        max_pending: i64,
        mode: QueueMode,
        runner: &dyn Runner,
    ) -> Self {
        let name = name.into();
        let observer: Arc<dyn Observer> = crate::metrics::PrometheusObserver::for_simple(&name);
        Self::build(name, worker_count, max_pending, mode, runner, observer)
    }

    /// Builds a pool with no metrics observer, for tests.
    #[cfg(test)]
    pub fn new_unobserved(
        name: impl Into<String>,
        worker_count: usize,
        max_pending: i64,
        mode: QueueMode,
        runner: &dyn Runner,
    ) -> Self {
        Self::build(
            name.into(),
            worker_count,
            max_pending,
            mode,
            runner,
            Arc::new(NoopObserver),
        )
    }

    fn build(
        name: String,
        worker_count: usize,
        max_pending: i64,
        mode: QueueMode,
        runner: &dyn Runner,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let queue = match mode {
            QueueMode::Fifo => QueueInner::Fifo(VecDeque::new()),
            QueueMode::Priority => QueueInner::Priority(BinaryHeap::new()),
        };
        let inner = Arc::new(Inner {
            queue: Mutex::new(queue),
            condvar: Condvar::new(),
            pending: AtomicI64::new(0),
            total: AtomicI64::new(0),
            traces: Mutex::new(HashMap::new()),
            destroyed: AtomicBool::new(false),
            observer,
            max_pending,
        });

        let handles = (0..worker_count.max(1))
            .map(|_| {
                let inner = inner.clone();
                runner.spawn(Box::new(move || worker_loop(inner)))
            })
            .collect();

        Self {
            name,
            inner,
            handles: Mutex::new(handles),
        }
    }

    /// Pool name, used as the metric family's `<name>` segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks accepted but not yet finished.
    pub fn pending_count(&self) -> i64 {
        self.inner.pending_count()
    }

    /// Total tasks accepted since construction.
    pub fn total_count(&self) -> i64 {
        self.inner.total.load(Ordering::SeqCst)
    }

    /// Trace strings for every currently pending task.
    pub fn pending_task_traces(&self) -> Vec<String> {
        self.inner.traces.lock().unwrap().values().cloned().collect()
    }

    /// The `prometheus::Registry` backing this pool's metrics, for callers
    /// that want to scrape it directly. `None` if the pool was built
    /// without a real metrics sink (e.g. `new_unobserved` in tests).
    pub fn metrics_registry(&self) -> Option<&prometheus::Registry> {
        self.inner.observer.registry()
    }

    /// Submits a task to the shared queue.
    pub fn execute(&self, task: Task) -> Result<()> {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return Err(PoolError::PoolUnavailable);
        }
        let pending = self.inner.pending_count();
        if pending > self.inner.max_pending {
            self.inner.observer.on_admission_rejected();
            tracing::warn!(pool = %self.name, pending, max_pending = self.inner.max_pending, "admission rejected");
            return Err(PoolError::AdmissionRejected {
                pending,
                max_pending: self.inner.max_pending,
            });
        }

        let id = task.id();
        let trace = task.trace().map(str::to_string).unwrap_or_default();
        self.inner.traces.lock().unwrap().insert(id, trace);

        {
            let mut guard = self.inner.queue.lock().unwrap();
            guard.push(QueueItem {
                task,
                enqueued_at: Instant::now(),
            });
        }
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        self.inner.observer.on_task_added();
        self.inner.condvar.notify_one();
        Ok(())
    }

    /// Signals shutdown, wakes every runner, and joins them once the
    /// queue has fully drained. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.condvar.notify_all();
        for handle in self.handles.lock().unwrap().drain(..) {
            handle.join();
        }
    }
}

impl Drop for SimpleWorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ThreadRunner;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn wait_idle(pool: &SimpleWorkerPool) {
        for _ in 0..400 {
            if pool.pending_count() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("pool never drained");
    }

    #[test]
    fn fifo_mode_preserves_submission_order_single_worker() {
        let pool =
            SimpleWorkerPool::new_unobserved("fifo", 1, 1_000, QueueMode::Fifo, &ThreadRunner);
        let order = Arc::new(StdMutex::new(Vec::new()));
        for i in 0..10 {
            let o = order.clone();
            pool.execute(Task::new("t", move || o.lock().unwrap().push(i)))
                .unwrap();
        }
        wait_idle(&pool);
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn priority_mode_drains_in_priority_order_single_worker() {
        let pool = SimpleWorkerPool::new_unobserved(
            "prio",
            1,
            1_000,
            QueueMode::Priority,
            &ThreadRunner,
        );
        // First task keeps the single worker busy so the rest queue up
        // before any of them is popped.
        let gate = Arc::new(StdMutex::new(()));
        let g = gate.clone();
        let held = gate.lock().unwrap();
        pool.execute(Task::new("t", move || {
            let _g = g.lock().unwrap();
        }))
        .unwrap();

        let order = Arc::new(StdMutex::new(Vec::new()));
        for key in [5, 1, 3, 2, 4] {
            let o = order.clone();
            pool.execute(
                Task::new("t", move || o.lock().unwrap().push(key)).with_priority_key(key),
            )
            .unwrap();
        }
        drop(held);
        wait_idle(&pool);
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn destroy_prevents_further_submission() {
        let pool =
            SimpleWorkerPool::new_unobserved("d", 2, 1_000, QueueMode::Fifo, &ThreadRunner);
        pool.destroy();
        let err = pool.execute(Task::new("t", || {})).unwrap_err();
        assert_eq!(err, PoolError::PoolUnavailable);
    }

    #[test]
    fn destroy_is_idempotent() {
        let pool =
            SimpleWorkerPool::new_unobserved("d2", 2, 1_000, QueueMode::Fifo, &ThreadRunner);
        pool.destroy();
        pool.destroy();
    }

    #[test]
    fn queue_run_latency_tracks_task_duration_within_tolerance() {
        let observer = crate::metrics::PrometheusObserver::for_simple("latency");
        let pool = SimpleWorkerPool::build(
            "latency".to_string(),
            1,
            1_000,
            QueueMode::Fifo,
            &ThreadRunner,
            observer.clone(),
        );
        let sleep_ms = 40u64;
        for _ in 0..5 {
            pool.execute(Task::new("t", move || {
                std::thread::sleep(Duration::from_millis(sleep_ms));
            }))
            .unwrap();
        }
        wait_idle(&pool);

        let families = observer.registry().gather();
        let run_family = families
            .iter()
            .find(|f| f.get_name().ends_with("queue_run_latency"))
            .expect("run latency histogram registered");
        let histogram = run_family.get_metric()[0].get_histogram();
        let observed_avg_us = histogram.get_sample_sum() / histogram.get_sample_count() as f64;
        let expected_us = (sleep_ms * 1_000) as f64;
        let tolerance = expected_us * 0.2;
        assert!(
            (observed_avg_us - expected_us).abs() <= tolerance,
            "observed {observed_avg_us}us not within 20% of expected {expected_us}us"
        );
    }

    #[test]
    fn admission_bound_rejects_past_capacity() {
        let pool =
            SimpleWorkerPool::new_unobserved("bound", 1, 10, QueueMode::Fifo, &ThreadRunner);
        let block = Arc::new(StdMutex::new(()));
        let guard = block.lock().unwrap();
        let mut rejected = 0;
        for _ in 0..20 {
            let b = block.clone();
            let res = pool.execute(Task::new("t", move || {
                let _g = b.lock().unwrap();
            }));
            if res.is_err() {
                rejected += 1;
            }
        }
        drop(guard);
        wait_idle(&pool);
        assert!(rejected > 0);
    }
}

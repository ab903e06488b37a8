//! A single drainer with a private FIFO.
//!
//! One channel, one dedicated drain loop, counters updated from both the
//! submitting side (`execute`) and the draining side (task completion).
//! Each worker also carries its own trace map and observer hook directly,
//! since `ExecqWorkerPool` aggregates across many of these rather than
//! sharing one queue.
//!
//! `execute()` always tests the send outcome *before* touching any
//! counter or trace state implied by success, rather than updating state
//! optimistically and checking for failure afterward — a task that fails
//! to enqueue must never be counted as pending.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam::channel::{self, Sender};

use crate::error::{PoolError, Result};
use crate::metrics::{NoopObserver, Observer};
use crate::runner::{JoinOutcome, Runner};
use crate::task::Task;

/// A worker: one private FIFO, one dedicated drain loop.
pub struct Worker {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    join_handle: Mutex<Option<Box<dyn JoinOutcome>>>,
    pending: Arc<AtomicI64>,
    total: Arc<AtomicI64>,
    traces: Arc<Mutex<HashMap<u64, String>>>,
    destroyed: AtomicBool,
}

impl Worker {
    /// Builds and starts a worker, spawning its drain loop immediately on
    /// `runner`. There is no separate `Init` step: a worker with no drain
    /// loop running is not a useful state to expose.
    pub fn new(name: impl Into<String>, runner: &dyn Runner, observer: Arc<dyn Observer>) -> Self {
        let name = name.into();
        let (tx, rx) = channel::unbounded::<Task>();
        let pending = Arc::new(AtomicI64::new(0));
        let total = Arc::new(AtomicI64::new(0));
        let traces = Arc::new(Mutex::new(HashMap::new()));

        let loop_name = name.clone();
        let loop_pending = pending.clone();
        let loop_traces = traces.clone();
        let loop_observer = observer;
        let join_handle = runner.spawn(Box::new(move || {
            for task in rx.iter() {
                let id = task.id();
                tracing::debug!(worker = %loop_name, task_id = id, "task started");
                task.run();
                loop_pending.fetch_sub(1, Ordering::SeqCst);
                loop_traces.lock().unwrap().remove(&id);
                loop_observer.on_task_finished();
                tracing::debug!(worker = %loop_name, task_id = id, "task finished");
            }
            tracing::debug!(worker = %loop_name, "drain loop exiting: channel closed");
        }));

        Self {
            name,
            sender: Mutex::new(Some(tx)),
            join_handle: Mutex::new(Some(join_handle)),
            pending,
            total,
            traces,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Worker name, used in logs and trace keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submits a task to this worker's private FIFO.
    ///
    /// `EnqueueFailed` only happens once the worker has been destroyed
    /// (the channel's receiver dropped) or the runtime refused the send;
    /// a healthy worker always accepts.
    pub fn execute(&self, task: Task) -> Result<()> {
        let id = task.id();
        let trace = task.trace().map(str::to_string).unwrap_or_default();

        let guard = self.sender.lock().unwrap();
        let Some(sender) = guard.as_ref() else {
            tracing::warn!(worker = %self.name, task_id = id, "execute failed: worker destroyed");
            return Err(PoolError::PoolUnavailable);
        };

        match sender.send(task) {
            Ok(()) => {
                self.traces.lock().unwrap().insert(id, trace);
                self.pending.fetch_add(1, Ordering::SeqCst);
                self.total.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(worker = %self.name, task_id = id, "task accepted");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(worker = %self.name, task_id = id, "execute failed: channel closed");
                Err(PoolError::EnqueueFailed { task_id: id })
            }
        }
    }

    /// Current pending (accepted, not yet finished) task count.
    pub fn pending_count(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Total tasks accepted since construction.
    pub fn total_count(&self) -> i64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Trace strings for every currently pending task, for diagnostics.
    pub fn pending_task_traces(&self) -> Vec<String> {
        self.traces.lock().unwrap().values().cloned().collect()
    }

    /// Closes the private FIFO and joins the drain loop. Idempotent: a
    /// second call is a no-op.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sender.lock().unwrap().take();
        if let Some(handle) = self.join_handle.lock().unwrap().take() {
            handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new("worker", &crate::runner::ThreadRunner, Arc::new(NoopObserver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ThreadRunner;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn wait_until_idle(w: &Worker) {
        for _ in 0..200 {
            if w.pending_count() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("worker never drained");
    }

    #[test]
    fn executes_task_and_drains_serially() {
        let worker = Worker::new("w", &ThreadRunner, Arc::new(NoopObserver));
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let o = order.clone();
            worker
                .execute(Task::new("t", move || o.lock().unwrap().push(i)))
                .unwrap();
        }
        wait_until_idle(&worker);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        worker.destroy();
    }

    #[test]
    fn pending_and_total_counts_track_lifecycle() {
        let worker = Worker::new("w", &ThreadRunner, Arc::new(NoopObserver));
        let started = Arc::new(std::sync::Barrier::new(2));
        let s = started.clone();
        worker
            .execute(Task::new("t", move || {
                s.wait();
                std::thread::sleep(Duration::from_millis(20));
            }))
            .unwrap();
        started.wait();
        assert_eq!(worker.pending_count(), 1);
        wait_until_idle(&worker);
        assert_eq!(worker.total_count(), 1);
        worker.destroy();
    }

    #[test]
    fn destroy_rejects_further_execute() {
        let worker = Worker::new("w", &ThreadRunner, Arc::new(NoopObserver));
        worker.destroy();
        let err = worker.execute(Task::new("t", || {})).unwrap_err();
        assert_eq!(err, PoolError::PoolUnavailable);
    }

    #[test]
    fn destroy_is_idempotent() {
        let worker = Worker::new("w", &ThreadRunner, Arc::new(NoopObserver));
        worker.destroy();
        worker.destroy();
    }

    #[test]
    fn pending_traces_reflect_in_flight_tasks() {
        let worker = Worker::new("w", &ThreadRunner, Arc::new(NoopObserver));
        let started = Arc::new(std::sync::Barrier::new(2));
        let s = started.clone();
        worker
            .execute(
                Task::new("t", move || {
                    s.wait();
                    std::thread::sleep(Duration::from_millis(20));
                })
                .with_trace("op=slow"),
            )
            .unwrap();
        started.wait();
        assert_eq!(worker.pending_task_traces(), vec!["op=slow".to_string()]);
        wait_until_idle(&worker);
        assert!(worker.pending_task_traces().is_empty());
        worker.destroy();
    }

    #[test]
    fn observer_is_notified_on_finish() {
        let counted = Arc::new(AtomicUsize::new(0));
        struct CountingObserver(Arc<AtomicUsize>);
        impl Observer for CountingObserver {
            fn on_task_finished(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        let worker = Worker::new(
            "w",
            &ThreadRunner,
            Arc::new(CountingObserver(counted.clone())),
        );
        worker.execute(Task::new("t", || {})).unwrap();
        wait_until_idle(&worker);
        assert_eq!(counted.load(Ordering::SeqCst), 1);
        worker.destroy();
    }
}

//! The unit of work accepted by a pool.
//!
//! A process-wide atomic id counter seeded at 1, a boxed closure body, and
//! a handful of builder methods. `Task` is domain-agnostic fire-and-forget
//! work: no evaluation result, no deadline, just a trace string and a
//! priority/hash key a pool can use to order or route it.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide task id generator, seeded at 1.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// A self-contained unit of work.
///
/// `id` is assigned exactly once at construction and never reused.
/// `priority_key` defaults to `created_at_us` so FIFO is the natural
/// tie-break when a pool doesn't otherwise care about priority.
pub struct Task {
    id: u64,
    type_tag: String,
    created_at_us: i64,
    trace: Option<String>,
    priority_key: i64,
    work: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Creates a new task of the given type, wrapping `work`.
    ///
    /// `run()` is guaranteed to be called at most once by any pool in this
    /// crate; constructing a `Task` and never submitting it simply drops
    /// the closure.
    pub fn new<F>(type_tag: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let created_at_us = now_us();
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            type_tag: type_tag.into(),
            created_at_us,
            trace: None,
            priority_key: created_at_us,
            work: Box::new(work),
        }
    }

    /// Attaches a human-readable trace string, captured once at submission.
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Overrides the default (`created_at_us`) priority key.
    pub fn with_priority_key(mut self, priority_key: i64) -> Self {
        self.priority_key = priority_key;
        self
    }

    /// The task's process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Short type tag, used in logs and metric labels.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Microsecond timestamp captured at construction.
    pub fn created_at_us(&self) -> i64 {
        self.created_at_us
    }

    /// The trace string, if one was attached.
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// The total-order key priority-enabled pools sort by (smaller first).
    pub fn priority_key(&self) -> i64 {
        self.priority_key
    }

    /// Consumes the task, running its body exactly once.
    ///
    /// Failures inside the body are the task's own concern and must never
    /// propagate past the pool boundary — including panics, which are
    /// caught and logged rather than unwinding into the drainer/runner
    /// loop.
    pub fn run(self) {
        let type_tag = self.type_tag;
        let id = self.id;
        let result = std::panic::catch_unwind(AssertUnwindSafe(self.work));
        if let Err(payload) = result {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic payload>".to_string());
            tracing::error!(task_id = id, task_type = %type_tag, panic = %message, "task panicked during run()");
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("type_tag", &self.type_tag)
            .field("created_at_us", &self.created_at_us)
            .field("trace", &self.trace)
            .field("priority_key", &self.priority_key)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Task {}

/// Orders tasks so a `BinaryHeap<Task>` (a max-heap) pops the *smallest*
/// `priority_key` first. Ties are broken by id, which is arbitrary but
/// deterministic.
impl Ord for Task {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .priority_key
            .cmp(&self.priority_key)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn ids_are_unique_and_monotonic() {
        let a = Task::new("t", || {});
        let b = Task::new("t", || {});
        assert!(b.id() > a.id());
    }

    #[test]
    fn id_uniqueness_under_concurrent_construction() {
        use std::collections::HashSet;
        use std::thread;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    (0..2000)
                        .map(|_| Task::new("stress", || {}).id())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id), "duplicate task id {id}");
            }
        }
        assert_eq!(all.len(), 8 * 2000);
    }

    #[test]
    fn priority_key_defaults_to_creation_order() {
        let a = Task::new("t", || {});
        let b = Task::new("t", || {});
        assert!(a.priority_key() <= b.priority_key());
    }

    #[test]
    fn binary_heap_pops_smallest_priority_key_first() {
        let mut heap = BinaryHeap::new();
        for key in [5, 1, 3, 2, 4] {
            heap.push(Task::new("t", || {}).with_priority_key(key));
        }
        let order: Vec<i64> = std::iter::from_fn(|| heap.pop().map(|t| t.priority_key())).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn run_executes_body_exactly_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task = Task::new("t", move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        task.run();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_body_does_not_propagate() {
        let task = Task::new("t", || panic!("boom"));
        task.run(); // must not unwind out of this test
    }

    #[test]
    fn trace_is_captured_once() {
        let task = Task::new("t", || {}).with_trace("op=foo");
        assert_eq!(task.trace(), Some("op=foo"));
    }
}

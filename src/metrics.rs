//! Metric sinks for worker pools.
//!
//! The atomic counters on `Worker`/`pool/*.rs` are the single source of
//! truth for pending/total counts; the `Observer` trait is purely a
//! side-effecting projection of them, called at the same sites those
//! counters are updated — never read back from.
//!
//! `PrometheusObserver` is the concrete sink, using a stable naming
//! scheme for its metric families. Each instance owns a private
//! `prometheus::Registry` rather than registering into the process-global
//! default registry, so constructing more than one same-named pool in a
//! test never collides; embedding applications that want these exported
//! merge `PrometheusObserver::registry()` into their own registry/exporter.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

/// Observes pool-level lifecycle events for metrics purposes.
///
/// Implementations must be cheap to call from hot paths (submission,
/// drainer completion) — no locking beyond what the underlying metric
/// type itself requires.
pub trait Observer: Send + Sync {
    /// A task was accepted (pending +1, total +1).
    fn on_task_added(&self) {}
    /// A task finished running (pending -1).
    fn on_task_finished(&self) {}
    /// A submission was rejected by the admission check.
    fn on_admission_rejected(&self) {}
    /// Time spent between accept and the task starting to run
    /// (`SimpleWorkerPool` only).
    fn on_queue_wait(&self, _elapsed: Duration) {}
    /// Time spent actually running the task (`SimpleWorkerPool` only).
    fn on_queue_run(&self, _elapsed: Duration) {}

    /// The `prometheus::Registry` backing this observer, for pools that
    /// want to let callers scrape their metrics directly. `None` for
    /// observers (like [`NoopObserver`]) with nothing to export.
    fn registry(&self) -> Option<&Registry> {
        None
    }
}

/// An `Observer` that does nothing — the default for pools constructed
/// without an explicit metrics sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Prometheus-backed implementation of [`Observer`].
pub struct PrometheusObserver {
    registry: Registry,
    total_task_count: IntCounter,
    pending_task_count: IntGauge,
    admission_rejected: IntCounter,
    queue_wait_latency: Option<Histogram>,
    queue_run_latency: Option<Histogram>,
}

impl PrometheusObserver {
    /// Builds the `dingo_worker_set_<name>_*` family (execq pool; no
    /// latency histograms — there is no single shared queue to time).
    pub fn for_execq(name: &str) -> Arc<Self> {
        Arc::new(Self::build(&format!("dingo_worker_set_{name}"), false))
    }

    /// Builds the `dingo_simple_worker_set_<name>_*` family, including the
    /// queue-wait/queue-run latency histograms.
    pub fn for_simple(name: &str) -> Arc<Self> {
        Arc::new(Self::build(&format!("dingo_simple_worker_set_{name}"), true))
    }

    fn build(prefix: &str, with_latency: bool) -> Self {
        let registry = Registry::new();

        let total_task_count = IntCounter::with_opts(Opts::new(
            format!("{prefix}_total_task_count"),
            "total tasks accepted since init",
        ))
        .expect("valid counter opts");
        let pending_task_count = IntGauge::with_opts(Opts::new(
            format!("{prefix}_pending_task_count"),
            "tasks accepted but not yet finished",
        ))
        .expect("valid gauge opts");
        let admission_rejected = IntCounter::with_opts(Opts::new(
            format!("{prefix}_admission_rejected_count"),
            "submissions rejected by the admission check",
        ))
        .expect("valid counter opts");

        registry
            .register(Box::new(total_task_count.clone()))
            .expect("unique metric name");
        registry
            .register(Box::new(pending_task_count.clone()))
            .expect("unique metric name");
        registry
            .register(Box::new(admission_rejected.clone()))
            .expect("unique metric name");

        let (queue_wait_latency, queue_run_latency) = if with_latency {
            let wait = Histogram::with_opts(HistogramOpts::new(
                format!("{prefix}_queue_wait_latency"),
                "microseconds between accept and run start",
            ))
            .expect("valid histogram opts");
            let run = Histogram::with_opts(HistogramOpts::new(
                format!("{prefix}_queue_run_latency"),
                "microseconds spent running the task",
            ))
            .expect("valid histogram opts");
            registry
                .register(Box::new(wait.clone()))
                .expect("unique metric name");
            registry
                .register(Box::new(run.clone()))
                .expect("unique metric name");
            (Some(wait), Some(run))
        } else {
            (None, None)
        };

        Self {
            registry,
            total_task_count,
            pending_task_count,
            admission_rejected,
            queue_wait_latency,
            queue_run_latency,
        }
    }

    /// The private registry backing this observer's metrics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Observer for PrometheusObserver {
    fn on_task_added(&self) {
        self.total_task_count.inc();
        self.pending_task_count.inc();
    }

    fn on_task_finished(&self) {
        self.pending_task_count.dec();
    }

    fn on_admission_rejected(&self) {
        self.admission_rejected.inc();
    }

    fn on_queue_wait(&self, elapsed: Duration) {
        if let Some(h) = &self.queue_wait_latency {
            h.observe(elapsed.as_micros() as f64);
        }
    }

    fn on_queue_run(&self, elapsed: Duration) {
        if let Some(h) = &self.queue_run_latency {
            h.observe(elapsed.as_micros() as f64);
        }
    }

    fn registry(&self) -> Option<&Registry> {
        Some(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execq_family_has_no_latency_histograms() {
        let obs = PrometheusObserver::for_execq("t");
        obs.on_queue_wait(Duration::from_micros(10)); // no-op, must not panic
        assert!(obs.queue_wait_latency.is_none());
    }

    #[test]
    fn simple_family_records_latency() {
        let obs = PrometheusObserver::for_simple("t");
        obs.on_queue_wait(Duration::from_micros(12_000));
        obs.on_queue_run(Duration::from_micros(50_000));
        let families = obs.registry().gather();
        assert!(families.iter().any(|f| f.get_name().ends_with("queue_wait_latency")));
    }

    #[test]
    fn counters_track_add_and_finish() {
        let obs = PrometheusObserver::for_execq("counters");
        obs.on_task_added();
        obs.on_task_added();
        obs.on_task_finished();
        assert_eq!(obs.pending_task_count.get(), 1);
        assert_eq!(obs.total_task_count.get(), 2);
    }
}

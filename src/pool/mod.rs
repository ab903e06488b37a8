//! Worker pools: `ExecqWorkerPool` (per-worker private FIFOs) and
//! `SimpleWorkerPool` (one shared queue).

pub mod execq;
pub mod simple;

pub use execq::ExecqWorkerPool;
pub use simple::SimpleWorkerPool;

/// Dispatch policy used by [`ExecqWorkerPool::execute`]'s default entry
/// point. Hash-by-key dispatch always needs a caller-supplied key, so it
/// has no place in this enum — it is never a pool's *default* policy,
/// only an explicit alternate entry point exposed regardless of how
/// `execute()` is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    /// Cycles workers in order.
    RoundRobin,
    /// Picks the worker with the fewest pending tasks.
    LeastLoaded,
}

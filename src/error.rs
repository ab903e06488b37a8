//! Error taxonomy for the task execution substrate.
//!
//! A flat `thiserror` enum, no source spans, no nested diagnostic system.
//! It exists for the APIs that need a concrete failure reason (admission
//! rejection, enqueue failure, scheduler trigger results) and for tests.

use thiserror::Error;

/// Error kinds surfaced by the worker pools and scheduler.
///
/// Task-internal failures are deliberately not representable here: a
/// task's `run()` must not let its own errors cross the pool boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// `max_pending` exceeded at submission time.
    #[error("admission rejected: pending {pending}/{max_pending}")]
    AdmissionRejected {
        /// Pending count observed at rejection time.
        pending: i64,
        /// The configured bound.
        max_pending: i64,
    },

    /// `execute*` called after `destroy()`.
    #[error("pool is not available (destroyed or worker unavailable)")]
    PoolUnavailable,

    /// The underlying execution queue refused the task.
    #[error("enqueue failed for task {task_id}")]
    EnqueueFailed {
        /// Id of the task that failed to enqueue.
        task_id: u64,
    },

    /// A scheduler trigger's external RPC failed.
    #[error("heartbeat response error: {0}")]
    HeartbeatResponse(String),
}

/// Result alias used across the crate's fallible, non-bool-returning APIs.
pub type Result<T> = std::result::Result<T, PoolError>;

//! # dingo-taskpool
//!
//! A task execution substrate for a distributed storage/indexing cluster:
//! fire-and-forget worker pools (`ExecqWorkerPool`, `SimpleWorkerPool`) and
//! a heartbeat scheduler (`HeartbeatScheduler`) built on top of them.
//!
//! ## Layout
//!
//! - [`task`] — the unit of work (`Task`), carried by every pool.
//! - [`worker`] — a single private-FIFO drainer (`Worker`).
//! - [`pool`] — the two pool shapes: per-worker FIFOs with dispatch
//!   policies (`ExecqWorkerPool`), and a shared FIFO-or-priority queue
//!   (`SimpleWorkerPool`).
//! - [`runner`] — the thread/async-task abstraction both pool shapes
//!   spawn their drain loops onto.
//! - [`scheduler`] — `HeartbeatScheduler` and its twelve periodic task
//!   classes (`store_heartbeat` plus eleven contract-only classes), each
//!   gated by leadership and/or a per-class running guard as its own
//!   semantics call for.
//! - [`metrics`] — the `Observer` trait and its `prometheus` sink.
//! - [`config`] — `HeartbeatConfig`, the scheduler's tunables.
//! - [`error`] — the pool/scheduler error taxonomy.

#![warn(missing_docs, rust_2018_idioms)]

/// Runtime configuration for the heartbeat scheduler's task classes.
pub mod config;
/// Error taxonomy shared by pools and the scheduler.
pub mod error;
/// Metric sinks (`Observer` trait, `prometheus` implementation).
pub mod metrics;
/// The two worker pool shapes.
pub mod pool;
/// Thread/async-task backing abstraction for pool drain loops.
pub mod runner;
/// The heartbeat scheduler and its periodic task classes.
pub mod scheduler;
/// The unit of work carried by every pool.
pub mod task;
/// A single private-FIFO drainer.
pub mod worker;

pub use config::HeartbeatConfig;
pub use error::{PoolError, Result};
pub use pool::{DispatchPolicy, ExecqWorkerPool, SimpleWorkerPool};
pub use pool::simple::QueueMode;
pub use runner::{Runner as PoolRunner, ThreadRunner, TokioRunner};
pub use scheduler::{HeartbeatScheduler, TaskActions};
pub use task::Task;
pub use worker::Worker;

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

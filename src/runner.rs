//! Polymorphic backing for a pool's worker loops: a single `Runner { spawn,
//! join }` trait unifying a plain OS thread and a tokio-task ("fiber")
//! backing behind one interface. A worker loop is written once against
//! `Runner`, and the pool picks an implementation at construction time.

use std::thread::JoinHandle;

/// A join handle abstracting over a spawned OS thread or an async task.
pub trait JoinOutcome: Send {
    /// Blocks (or, for the async case, blocks the calling thread on the
    /// runtime) until the spawned work completes.
    fn join(self: Box<Self>);
}

/// Spawns `Send + 'static` closures onto some execution backing.
///
/// [`ThreadRunner`] spawns a plain OS thread; [`TokioRunner`] spawns a
/// task on a shared tokio runtime (the "fiber" mode — tokio tasks are the
/// idiomatic Rust analogue of a lightweight green thread).
pub trait Runner: Send + Sync {
    /// Runs `body` on this runner's backing, returning a handle that can be
    /// joined to wait for completion.
    fn spawn(&self, body: Box<dyn FnOnce() + Send + 'static>) -> Box<dyn JoinOutcome>;
}

/// Spawns one OS thread per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRunner;

struct ThreadJoin(JoinHandle<()>);

impl JoinOutcome for ThreadJoin {
    fn join(self: Box<Self>) {
        if self.0.join().is_err() {
            tracing::error!("runner thread panicked");
        }
    }
}

impl Runner for ThreadRunner {
    fn spawn(&self, body: Box<dyn FnOnce() + Send + 'static>) -> Box<dyn JoinOutcome> {
        Box::new(ThreadJoin(std::thread::spawn(body)))
    }
}

/// Spawns work as a task on a shared `tokio::runtime::Handle`, blocking it
/// on a dedicated executor thread — the "fiber" backing.
#[derive(Clone)]
pub struct TokioRunner {
    handle: tokio::runtime::Handle,
}

impl TokioRunner {
    /// Builds a runner bound to the given runtime handle.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

struct TokioJoin {
    handle: tokio::runtime::Handle,
    task: tokio::task::JoinHandle<()>,
}

impl JoinOutcome for TokioJoin {
    fn join(self: Box<Self>) {
        if self.handle.block_on(self.task).is_err() {
            tracing::error!("runner task panicked");
        }
    }
}

impl Runner for TokioRunner {
    fn spawn(&self, body: Box<dyn FnOnce() + Send + 'static>) -> Box<dyn JoinOutcome> {
        // tokio tasks are cooperative; a blocking closure is moved onto a
        // blocking-pool thread rather than the async reactor threads so it
        // can never stall other fibers sharing the runtime.
        let task = self.handle.spawn_blocking(body);
        Box::new(TokioJoin {
            handle: self.handle.clone(),
            task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn thread_runner_executes_body() {
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        ThreadRunner
            .spawn(Box::new(move || r.store(true, Ordering::SeqCst)))
            .join();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn tokio_runner_executes_body() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let runner = TokioRunner::new(rt.handle().clone());
        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        runner
            .spawn(Box::new(move || r.store(true, Ordering::SeqCst)))
            .join();
        assert!(ran.load(Ordering::SeqCst));
    }
}

//! Per-task-class running guards.
//!
//! `GuardedFlag` is an RAII mutual-exclusion flag that sets itself true
//! on acquire and false on drop, so an early `return` or panic still
//! releases it. Each task class instance owns its own flag rather than
//! sharing a process-wide global, so two schedulers in the same process
//! (e.g. in tests) never contend state they shouldn't.

use std::sync::atomic::{AtomicBool, Ordering};

/// Mutual-exclusion flag for one task class. `try_acquire` is the only way
/// to observe or flip it, so there is no way to forget to release.
#[derive(Debug, Default)]
pub struct GuardedFlag {
    running: AtomicBool,
}

impl GuardedFlag {
    /// A flag that starts unheld.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// Attempts to acquire the flag. Returns `None` if another invocation
    /// already holds it — the caller should skip this trigger.
    pub fn try_acquire(&self) -> Option<TaskGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| TaskGuard { flag: &self.running })
    }

    /// Whether the flag is currently held, for diagnostics/tests only.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Releases its `GuardedFlag` on drop, including on early return or panic
/// unwinding through the holding scope.
pub struct TaskGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_held() {
        let flag = GuardedFlag::new();
        let first = flag.try_acquire().expect("first acquire succeeds");
        assert!(flag.try_acquire().is_none());
        drop(first);
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn drop_releases_even_on_early_return() {
        let flag = GuardedFlag::new();
        fn holds_and_returns_early(flag: &GuardedFlag) -> bool {
            let _guard = match flag.try_acquire() {
                Some(g) => g,
                None => return false,
            };
            true
        }
        assert!(holds_and_returns_early(&flag));
        assert!(!flag.is_running());
    }
}

//! Contract-only task classes: every periodic task besides
//! `store_heartbeat` is specified only by its collaborator contract, with
//! no further algorithm named. Rather than eleven near-identical structs
//! each reimplementing their own gating, they all share this one generic
//! wrapper around an [`ExternalAction`], parameterized by whether it
//! leader-gates and whether it guards — the two vary independently across
//! classes (a handful guard without leader-gating, one does neither).

use crate::error::Result;
use crate::scheduler::collaborators::{CoordinatorControl, ExternalAction};
use crate::scheduler::guard::GuardedFlag;
use std::sync::Arc;

/// One periodic task class: a name (for logs/metrics), a guard, and the
/// external action it performs when triggered.
pub struct GenericPeriodicTask {
    name: &'static str,
    leader_gated: bool,
    guarded: bool,
    guard: GuardedFlag,
    action: Arc<dyn ExternalAction>,
}

impl GenericPeriodicTask {
    /// Builds a task class named `name`, delegating its work to `action`.
    ///
    /// `leader_gated` skips the action entirely on a non-leader process.
    /// `guarded` runs the action under a `GuardedFlag`, skipping a trigger
    /// that arrives while a previous run is still in flight; when `false`
    /// concurrent runs are allowed and the guard is never touched.
    pub fn new(
        name: &'static str,
        action: Arc<dyn ExternalAction>,
        leader_gated: bool,
        guarded: bool,
    ) -> Self {
        Self {
            name,
            leader_gated,
            guarded,
            guard: GuardedFlag::new(),
            action,
        }
    }

    /// Class name, as logged and used in metric labels.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Leader check first (if `leader_gated`), guard check second (if
    /// `guarded`), then delegates to the wrapped action.
    pub async fn trigger(&self, coordinator: &dyn CoordinatorControl) -> Result<()> {
        if self.leader_gated && !coordinator.is_leader().await {
            tracing::debug!(task = self.name, "skipped: not leader");
            return Ok(());
        }
        if !self.guarded {
            tracing::debug!(task = self.name, "running");
            return self.action.perform().await;
        }
        let Some(_guard) = self.guard.try_acquire() else {
            tracing::debug!(task = self.name, "skipped: already running");
            return Ok(());
        };
        tracing::debug!(task = self.name, "running");
        self.action.perform().await
    }
}

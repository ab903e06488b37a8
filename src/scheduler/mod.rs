//! `HeartbeatScheduler`: a single dedicated worker draining periodic task
//! classes, each gated by leadership and/or a running guard according to
//! its own row in the wiring table below — not a single shared rule.
//!
//! Callers never block on a trigger — each `trigger_*` method submits a
//! task to the scheduler's own single-worker `ExecqWorkerPool` and returns
//! as soon as it's accepted. The timer callback that actually decides
//! when to fire each trigger lives outside this crate; what's here is the
//! fire-and-forget submission and the per-class guard/leader gating.

pub mod collaborators;
pub mod guard;
pub mod tasks;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::HeartbeatConfig;
use crate::error::Result;
use crate::pool::{DispatchPolicy, ExecqWorkerPool};
use crate::runner::Runner;
use crate::task::Task;

use collaborators::{CoordinatorControl, ExternalAction};
use tasks::{GenericPeriodicTask, StoreHeartbeatTask};

const STATE_REFRESH: &str = "state_refresh";
const JOB_LIST_PROCESS: &str = "job_list_process";
const RECYCLE_ORPHAN: &str = "recycle_orphan";
const META_WATCH_CLEAN: &str = "meta_watch_clean";
const ONE_TIME_WATCH: &str = "one_time_watch";
const TABLE_METRICS: &str = "table_metrics";
const LEASE: &str = "lease";
const COMPACTION: &str = "compaction";
const VECTOR_INDEX_SCRUB: &str = "vector_index_scrub";
const BALANCE_LEADER: &str = "balance_leader";
const BALANCE_REGION: &str = "balance_region";

/// The eleven contract-only task classes' collaborators, named explicitly
/// so construction is type-checked even though dispatch is by name
/// internally.
pub struct TaskActions {
    /// Refreshes cached region/store state.
    pub state_refresh: Arc<dyn ExternalAction>,
    /// Processes the coordinator's pending job list.
    pub job_list_process: Arc<dyn ExternalAction>,
    /// Recycles orphaned resources left behind by failed operations.
    pub recycle_orphan: Arc<dyn ExternalAction>,
    /// Cleans stale metadata watches.
    pub meta_watch_clean: Arc<dyn ExternalAction>,
    /// Runs a registered one-time watch callback.
    pub one_time_watch: Arc<dyn ExternalAction>,
    /// Recomputes and publishes table-level metrics.
    pub table_metrics: Arc<dyn ExternalAction>,
    /// Renews or reaps expired leases.
    pub lease: Arc<dyn ExternalAction>,
    /// Triggers compaction bookkeeping.
    pub compaction: Arc<dyn ExternalAction>,
    /// Scrubs vector index consistency.
    pub vector_index_scrub: Arc<dyn ExternalAction>,
    /// Rebalances region leaders across stores.
    pub balance_leader: Arc<dyn ExternalAction>,
    /// Rebalances region replicas across stores.
    pub balance_region: Arc<dyn ExternalAction>,
}

struct Inner {
    coordinator: Arc<dyn CoordinatorControl>,
    config: HeartbeatConfig,
    store_heartbeat: StoreHeartbeatTask,
    generic: HashMap<&'static str, GenericPeriodicTask>,
}

/// Owns the scheduler's single worker and every task class's guard state.
pub struct HeartbeatScheduler {
    pool: ExecqWorkerPool,
    inner: Arc<Inner>,
}

impl HeartbeatScheduler {
    /// Builds a scheduler backed by `runner`, gated by `coordinator`, with
    /// its periodic task classes wired to `actions`.
    pub fn new(
        runner: &dyn Runner,
        coordinator: Arc<dyn CoordinatorControl>,
        config: HeartbeatConfig,
        store_heartbeat: StoreHeartbeatTask,
        actions: TaskActions,
    ) -> Self {
        // Admission is unbounded here: triggers are driven by the
        // scheduler's own timer loop, not external load, so there is no
        // useful backpressure signal to apply against it.
        let pool = ExecqWorkerPool::new(
            "heartbeat_scheduler",
            1,
            i64::MAX,
            DispatchPolicy::RoundRobin,
            runner,
        );

        // (name, action, leader_gated, guarded) — the two gates vary
        // independently per class; see each row's trigger method below.
        let mut generic = HashMap::new();
        generic.insert(
            STATE_REFRESH,
            GenericPeriodicTask::new(STATE_REFRESH, actions.state_refresh, true, true),
        );
        generic.insert(
            JOB_LIST_PROCESS,
            GenericPeriodicTask::new(JOB_LIST_PROCESS, actions.job_list_process, true, true),
        );
        generic.insert(
            RECYCLE_ORPHAN,
            GenericPeriodicTask::new(RECYCLE_ORPHAN, actions.recycle_orphan, false, true),
        );
        generic.insert(
            META_WATCH_CLEAN,
            GenericPeriodicTask::new(META_WATCH_CLEAN, actions.meta_watch_clean, false, true),
        );
        generic.insert(
            ONE_TIME_WATCH,
            GenericPeriodicTask::new(ONE_TIME_WATCH, actions.one_time_watch, true, true),
        );
        generic.insert(
            TABLE_METRICS,
            GenericPeriodicTask::new(TABLE_METRICS, actions.table_metrics, true, true),
        );
        generic.insert(
            LEASE,
            GenericPeriodicTask::new(LEASE, actions.lease, false, true),
        );
        generic.insert(
            COMPACTION,
            GenericPeriodicTask::new(COMPACTION, actions.compaction, true, true),
        );
        generic.insert(
            VECTOR_INDEX_SCRUB,
            GenericPeriodicTask::new(VECTOR_INDEX_SCRUB, actions.vector_index_scrub, false, false),
        );
        generic.insert(
            BALANCE_LEADER,
            GenericPeriodicTask::new(BALANCE_LEADER, actions.balance_leader, true, false),
        );
        generic.insert(
            BALANCE_REGION,
            GenericPeriodicTask::new(BALANCE_REGION, actions.balance_region, true, false),
        );

        Self {
            pool,
            inner: Arc::new(Inner {
                coordinator,
                config,
                store_heartbeat,
                generic,
            }),
        }
    }

    fn submit_generic(&self, name: &'static str) -> Result<()> {
        let inner = self.inner.clone();
        let task = Task::new(name, move || {
            let Some(task) = inner.generic.get(name) else {
                return;
            };
            if let Err(e) =
                futures::executor::block_on(task.trigger(inner.coordinator.as_ref()))
            {
                tracing::error!(task = name, error = %e, "trigger failed");
            }
        });
        self.pool.execute(task)
    }

    /// Fires the store-heartbeat exchange. `region_ids` empty means "let
    /// the task decide" whether to attach region metrics; non-empty always
    /// reports exactly those regions. Unlike every other trigger, this one
    /// has no leader gate and no guard — concurrent submissions are fine.
    pub fn trigger_store_heartbeat(
        &self,
        region_ids: Vec<i64>,
        update_epoch_version: bool,
    ) -> Result<()> {
        let inner = self.inner.clone();
        let task = Task::new("store_heartbeat", move || {
            if let Err(e) = futures::executor::block_on(
                inner
                    .store_heartbeat
                    .trigger(region_ids, update_epoch_version),
            ) {
                tracing::error!(error = %e, "store_heartbeat trigger failed");
            }
        });
        self.pool.execute(task)
    }

    /// Fires the state-refresh task class.
    pub fn trigger_state_refresh(&self) -> Result<()> {
        self.submit_generic(STATE_REFRESH)
    }

    /// Fires the job-list-processor task class.
    pub fn trigger_job_list_process(&self) -> Result<()> {
        self.submit_generic(JOB_LIST_PROCESS)
    }

    /// Fires the recycle-orphan task class.
    pub fn trigger_recycle_orphan(&self) -> Result<()> {
        self.submit_generic(RECYCLE_ORPHAN)
    }

    /// Fires the meta-watch-clean task class.
    pub fn trigger_meta_watch_clean(&self) -> Result<()> {
        self.submit_generic(META_WATCH_CLEAN)
    }

    /// Fires the one-time-watch task class.
    pub fn trigger_one_time_watch(&self) -> Result<()> {
        self.submit_generic(ONE_TIME_WATCH)
    }

    /// Fires the table-metrics task class.
    pub fn trigger_table_metrics(&self) -> Result<()> {
        self.submit_generic(TABLE_METRICS)
    }

    /// Fires the lease task class.
    pub fn trigger_lease(&self) -> Result<()> {
        self.submit_generic(LEASE)
    }

    /// Fires the compaction task class.
    pub fn trigger_compaction(&self) -> Result<()> {
        self.submit_generic(COMPACTION)
    }

    /// Fires the vector-index-scrub task class.
    pub fn trigger_vector_index_scrub(&self) -> Result<()> {
        self.submit_generic(VECTOR_INDEX_SCRUB)
    }

    /// Fires the balance-leader task class, a no-op if
    /// `enable_balance_leader` is off.
    pub fn trigger_balance_leader(&self) -> Result<()> {
        if !self.inner.config.enable_balance_leader {
            tracing::debug!("balance_leader disabled by config");
            return Ok(());
        }
        self.submit_generic(BALANCE_LEADER)
    }

    /// Fires the balance-region task class, a no-op if
    /// `enable_balance_region` is off.
    pub fn trigger_balance_region(&self) -> Result<()> {
        if !self.inner.config.enable_balance_region {
            tracing::debug!("balance_region disabled by config");
            return Ok(());
        }
        self.submit_generic(BALANCE_REGION)
    }

    /// Shuts down the scheduler's worker.
    pub fn destroy(&self) {
        self.pool.destroy();
    }
}

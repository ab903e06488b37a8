//! Runnable demo: wires one `ExecqWorkerPool`, one `SimpleWorkerPool`, and
//! a `HeartbeatScheduler` backed by in-memory collaborators, firing each
//! scheduler trigger once on a short timer loop.

use std::sync::Arc;
use std::time::Duration;

use dingo_taskpool::pool::simple::QueueMode;
use dingo_taskpool::pool::DispatchPolicy;
use dingo_taskpool::scheduler::collaborators::{
    InMemoryRegionSource, InMemoryStoreView, NoopAction, StaticLeader, StoreHeartbeatResponse,
    StoreHeartbeatTransport, StoreInfo,
};
use dingo_taskpool::scheduler::tasks::StoreHeartbeatTask;
use dingo_taskpool::{ExecqWorkerPool, HeartbeatConfig, HeartbeatScheduler, SimpleWorkerPool, Task, TaskActions, ThreadRunner};

struct LoggingTransport;

#[async_trait::async_trait]
impl StoreHeartbeatTransport for LoggingTransport {
    async fn send_store_heartbeat(
        &self,
        request: dingo_taskpool::scheduler::collaborators::StoreHeartbeatRequest,
    ) -> dingo_taskpool::Result<StoreHeartbeatResponse> {
        tracing::info!(store_id = request.self_store.id, "sent store heartbeat");
        Ok(StoreHeartbeatResponse {
            stores: vec![request.self_store],
            cluster_is_read_only: false,
            cluster_is_force_read_only: false,
        })
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runner = ThreadRunner;

    let execq = ExecqWorkerPool::new(
        "demo_execq",
        num_cpus::get().max(2),
        1_000,
        DispatchPolicy::RoundRobin,
        &runner,
    );
    for i in 0..8 {
        execq
            .execute(Task::new("demo", move || {
                tracing::info!(i, "execq task ran");
            }))
            .expect("demo submissions stay under the admission bound");
    }

    let simple = SimpleWorkerPool::new("demo_simple", 4, 1_000, QueueMode::Priority, &runner);
    for key in [5, 1, 3, 2, 4] {
        simple
            .execute(Task::new("demo", move || {
                tracing::info!(key, "simple task ran");
            }).with_priority_key(key))
            .expect("demo submissions stay under the admission bound");
    }

    let store_view = Arc::new(InMemoryStoreView::new(StoreInfo {
        id: 1,
        raft_host: "127.0.0.1".to_string(),
        raft_port: 10101,
    }));
    let store_heartbeat = StoreHeartbeatTask::new(
        store_view,
        Arc::new(InMemoryRegionSource::default()),
        Arc::new(LoggingTransport),
        HeartbeatConfig::default(),
    );
    let scheduler = HeartbeatScheduler::new(
        &runner,
        Arc::new(StaticLeader::new(true)),
        HeartbeatConfig::default(),
        store_heartbeat,
        TaskActions {
            state_refresh: Arc::new(NoopAction),
            job_list_process: Arc::new(NoopAction),
            recycle_orphan: Arc::new(NoopAction),
            meta_watch_clean: Arc::new(NoopAction),
            one_time_watch: Arc::new(NoopAction),
            table_metrics: Arc::new(NoopAction),
            lease: Arc::new(NoopAction),
            compaction: Arc::new(NoopAction),
            vector_index_scrub: Arc::new(NoopAction),
            balance_leader: Arc::new(NoopAction),
            balance_region: Arc::new(NoopAction),
        },
    );

    scheduler.trigger_store_heartbeat(Vec::new(), false).unwrap();
    scheduler.trigger_state_refresh().unwrap();
    scheduler.trigger_job_list_process().unwrap();
    scheduler.trigger_recycle_orphan().unwrap();
    scheduler.trigger_meta_watch_clean().unwrap();
    scheduler.trigger_one_time_watch().unwrap();
    scheduler.trigger_table_metrics().unwrap();
    scheduler.trigger_lease().unwrap();
    scheduler.trigger_compaction().unwrap();
    scheduler.trigger_vector_index_scrub().unwrap();
    scheduler.trigger_balance_leader().unwrap();
    scheduler.trigger_balance_region().unwrap();

    std::thread::sleep(Duration::from_millis(200));

    tracing::info!(
        execq_pending = execq.pending_count(),
        execq_total = execq.total_count(),
        simple_pending = simple.pending_count(),
        simple_total = simple.total_count(),
        "demo run complete"
    );

    scheduler.destroy();
    execq.destroy();
    simple.destroy();
}

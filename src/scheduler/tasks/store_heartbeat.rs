//! `store_heartbeat` task class — the one periodic task specified down to
//! its algorithm rather than just its collaborator contract: a three-way
//! diff of the local store map against the heartbeat response's store
//! list, plus edge-triggered propagation of the cluster read-only flags,
//! plus region metrics attached on a sampling cadence.
//!
//! Unlike every other task class, this one has neither a leader gate nor a
//! guard: concurrent submissions are allowed, and a non-leader store still
//! has to heartbeat so the coordinator keeps seeing it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::HeartbeatConfig;
use crate::error::Result;
use crate::scheduler::collaborators::{
    RegionInfo, RegionSource, RegionState, StoreHeartbeatRequest, StoreHeartbeatTransport,
    StoreInfo, StoreView,
};

/// Runs the store heartbeat exchange and reconciles the local store view
/// against the response.
pub struct StoreHeartbeatTask {
    view: Arc<dyn StoreView>,
    transport: Arc<dyn StoreHeartbeatTransport>,
    regions: Arc<dyn RegionSource>,
    config: HeartbeatConfig,
    heartbeat_count: AtomicU64,
    cluster_is_read_only: AtomicBool,
    cluster_is_force_read_only: AtomicBool,
}

/// The three-way diff result, returned from `reconcile` for testability
/// without a transport round-trip.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Stores present in the response but absent locally.
    pub new_stores: Vec<StoreInfo>,
    /// Stores present in both, but whose raft host/port differs.
    pub changed_stores: Vec<StoreInfo>,
    /// Store ids present locally but absent from the response.
    pub deleted_store_ids: Vec<i64>,
}

impl StoreHeartbeatTask {
    /// Builds a task bound to the given store view, region source, and
    /// transport, honoring `config`'s region-reporting cadence and raft
    /// snapshot policy.
    pub fn new(
        view: Arc<dyn StoreView>,
        regions: Arc<dyn RegionSource>,
        transport: Arc<dyn StoreHeartbeatTransport>,
        config: HeartbeatConfig,
    ) -> Self {
        Self {
            view,
            transport,
            regions,
            config,
            heartbeat_count: AtomicU64::new(0),
            cluster_is_read_only: AtomicBool::new(false),
            cluster_is_force_read_only: AtomicBool::new(false),
        }
    }

    /// Runs unconditionally: no leader gate, no guard, so overlapping
    /// triggers may run this concurrently.
    pub async fn trigger(&self, region_ids: Vec<i64>, update_epoch_version: bool) -> Result<()> {
        self.run_once(region_ids, update_epoch_version).await
    }

    async fn run_once(&self, region_ids: Vec<i64>, update_epoch_version: bool) -> Result<()> {
        let local_id = self.view.local_store_id();
        let self_store = self
            .view
            .snapshot()
            .get(&local_id)
            .cloned()
            .unwrap_or(StoreInfo {
                id: local_id,
                raft_host: String::new(),
                raft_port: 0,
            });

        let is_partial_region_metrics = !region_ids.is_empty();
        let count = self.heartbeat_count.fetch_add(1, Ordering::SeqCst);
        let multiple = self.config.store_heartbeat_report_region_multiple.max(1) as u64;
        let need_report_region_metrics = is_partial_region_metrics || count % multiple == 0;
        let region_metrics = if need_report_region_metrics {
            self.collect_region_metrics(&region_ids)
        } else {
            Vec::new()
        };

        let response = self
            .transport
            .send_store_heartbeat(StoreHeartbeatRequest {
                self_store,
                region_ids,
                update_epoch_version,
                is_partial_region_metrics,
                region_metrics,
            })
            .await?;

        let local = self.view.snapshot();
        let outcome = reconcile(&local, &response.stores, local_id);

        for store in outcome.new_stores {
            tracing::info!(store_id = store.id, "store heartbeat: new store");
            self.view.upsert(store);
        }
        for store in outcome.changed_stores {
            tracing::info!(store_id = store.id, "store heartbeat: store address changed");
            self.view.upsert(store);
        }
        for id in outcome.deleted_store_ids {
            tracing::info!(store_id = id, "store heartbeat: store removed");
            self.view.remove(id);
        }

        if response.cluster_is_read_only
            != self.cluster_is_read_only.load(Ordering::SeqCst)
        {
            tracing::info!(
                read_only = response.cluster_is_read_only,
                "cluster read-only flag changed"
            );
            self.cluster_is_read_only
                .store(response.cluster_is_read_only, Ordering::SeqCst);
        }
        if response.cluster_is_force_read_only
            != self.cluster_is_force_read_only.load(Ordering::SeqCst)
        {
            tracing::info!(
                force_read_only = response.cluster_is_force_read_only,
                "cluster force-read-only flag changed"
            );
            self.cluster_is_force_read_only
                .store(response.cluster_is_force_read_only, Ordering::SeqCst);
        }

        Ok(())
    }

    /// Collects the regions to attach to this heartbeat: all locally known
    /// regions if `requested` is empty, otherwise exactly `requested`.
    /// Regions mid-split or mid-merge are skipped, and each region's
    /// snapshot epoch version is overridden by `raft_snapshot_policy` when
    /// that policy forces one.
    fn collect_region_metrics(&self, requested: &[i64]) -> Vec<RegionInfo> {
        let ids = if requested.is_empty() {
            self.regions.all_region_ids()
        } else {
            requested.to_vec()
        };

        ids.into_iter()
            .filter_map(|id| self.regions.region(id))
            .filter(|r| !matches!(r.state, RegionState::Splitting | RegionState::Merging))
            .map(|mut r| {
                if let Some(forced) = self.config.raft_snapshot_policy.snapshot_epoch_version() {
                    r.snapshot_epoch_version = forced;
                }
                r
            })
            .collect()
    }
}

/// The diff itself: a store is "changed" only when its raft address
/// differs, and `local_id` is never reported deleted even if the response
/// omits it.
fn reconcile(
    local: &std::collections::HashMap<i64, StoreInfo>,
    remote: &[StoreInfo],
    local_id: i64,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    for store in remote {
        match local.get(&store.id) {
            None => outcome.new_stores.push(store.clone()),
            Some(existing) => {
                if existing.raft_host != store.raft_host || existing.raft_port != store.raft_port
                {
                    outcome.changed_stores.push(store.clone());
                }
            }
        }
    }

    let remote_ids: std::collections::HashSet<i64> = remote.iter().map(|s| s.id).collect();
    for &id in local.keys() {
        if id != local_id && !remote_ids.contains(&id) {
            outcome.deleted_store_ids.push(id);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::collaborators::{InMemoryRegionSource, InMemoryStoreView};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn store(id: i64, host: &str, port: u16) -> StoreInfo {
        StoreInfo {
            id,
            raft_host: host.to_string(),
            raft_port: port,
        }
    }

    #[test]
    fn reconcile_classifies_new_changed_and_deleted() {
        let mut local = HashMap::new();
        local.insert(1, store(1, "h1", 1000)); // local/self, must never be "deleted"
        local.insert(2, store(2, "h2", 2000)); // unchanged
        local.insert(3, store(3, "h3", 3000)); // about to be deleted
        local.insert(4, store(4, "h4", 4000)); // about to change

        let remote = vec![
            store(2, "h2", 2000),
            store(4, "h4-new", 4000),
            store(5, "h5", 5000),
        ];

        let outcome = reconcile(&local, &remote, 1);
        assert_eq!(outcome.new_stores, vec![store(5, "h5", 5000)]);
        assert_eq!(outcome.changed_stores, vec![store(4, "h4-new", 4000)]);
        assert_eq!(outcome.deleted_store_ids, vec![3]);
    }

    #[test]
    fn local_store_is_never_marked_deleted() {
        let mut local = HashMap::new();
        local.insert(9, store(9, "self", 9000));
        let outcome = reconcile(&local, &[], 9);
        assert!(outcome.deleted_store_ids.is_empty());
    }

    struct FixedTransport(Mutex<Option<crate::scheduler::collaborators::StoreHeartbeatResponse>>);

    #[async_trait]
    impl StoreHeartbeatTransport for FixedTransport {
        async fn send_store_heartbeat(
            &self,
            _request: StoreHeartbeatRequest,
        ) -> Result<crate::scheduler::collaborators::StoreHeartbeatResponse> {
            Ok(self.0.lock().unwrap().take().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn trigger_runs_unconditionally_every_call() {
        let view = Arc::new(InMemoryStoreView::new(store(1, "h1", 1)));
        let regions = Arc::new(InMemoryRegionSource::default());
        let transport = Arc::new(FixedTransport(Mutex::new(None)));
        let task = StoreHeartbeatTask::new(view, regions, transport, HeartbeatConfig::default());
        // No leader gate and no guard: back-to-back triggers both run,
        // unlike every other task class in this crate.
        task.trigger(Vec::new(), false).await.unwrap();
        task.trigger(Vec::new(), false).await.unwrap();
        assert_eq!(task.heartbeat_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reconciles_response_into_view() {
        let view = Arc::new(InMemoryStoreView::new(store(1, "h1", 1)));
        let regions = Arc::new(InMemoryRegionSource::default());
        let response = crate::scheduler::collaborators::StoreHeartbeatResponse {
            stores: vec![store(1, "h1", 1), store(2, "h2", 2)],
            cluster_is_read_only: true,
            cluster_is_force_read_only: false,
        };
        let transport = Arc::new(FixedTransport(Mutex::new(Some(response))));
        let task = StoreHeartbeatTask::new(
            view.clone(),
            regions,
            transport,
            HeartbeatConfig::default(),
        );
        task.trigger(Vec::new(), false).await.unwrap();
        assert!(view.snapshot().contains_key(&2));
        assert!(task.cluster_is_read_only.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn region_metrics_skip_splitting_and_merging_and_apply_snapshot_policy() {
        let view = Arc::new(InMemoryStoreView::new(store(1, "h1", 1)));
        let regions = Arc::new(InMemoryRegionSource::new(vec![
            RegionInfo {
                id: 10,
                state: RegionState::Normal,
                leader_store_id: 1,
                snapshot_epoch_version: 7,
                raft_status: None,
                index_status: None,
            },
            RegionInfo {
                id: 11,
                state: RegionState::Splitting,
                leader_store_id: 1,
                snapshot_epoch_version: 7,
                raft_status: None,
                index_status: None,
            },
        ]));
        let mut config = HeartbeatConfig::default();
        config.raft_snapshot_policy = crate::config::RaftSnapshotPolicy::Dingo;
        let transport = Arc::new(FixedTransport(Mutex::new(None)));
        let task = StoreHeartbeatTask::new(view, regions, transport, config);

        let metrics = task.collect_region_metrics(&[]);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].id, 10);
        assert_eq!(metrics[0].snapshot_epoch_version, i64::MAX);
    }

    struct CapturingTransport(Mutex<Vec<usize>>);

    #[async_trait]
    impl StoreHeartbeatTransport for CapturingTransport {
        async fn send_store_heartbeat(
            &self,
            request: StoreHeartbeatRequest,
        ) -> Result<crate::scheduler::collaborators::StoreHeartbeatResponse> {
            self.0.lock().unwrap().push(request.region_metrics.len());
            Ok(Default::default())
        }
    }

    #[tokio::test]
    async fn region_metrics_reported_every_nth_heartbeat_when_no_ids_requested() {
        let view = Arc::new(InMemoryStoreView::new(store(1, "h1", 1)));
        let regions = Arc::new(InMemoryRegionSource::new(vec![RegionInfo {
            id: 10,
            state: RegionState::Normal,
            leader_store_id: 1,
            snapshot_epoch_version: 1,
            raft_status: None,
            index_status: None,
        }]));
        let mut config = HeartbeatConfig::default();
        config.store_heartbeat_report_region_multiple = 2;
        let transport = Arc::new(CapturingTransport(Mutex::new(Vec::new())));
        let task = StoreHeartbeatTask::new(view, regions, transport.clone(), config);

        task.trigger(Vec::new(), false).await.unwrap(); // count=0: 0 % 2 == 0, reported.
        task.trigger(Vec::new(), false).await.unwrap(); // count=1: 1 % 2 != 0, skipped.
        task.trigger(Vec::new(), false).await.unwrap(); // count=2: reported again.
        assert_eq!(*transport.0.lock().unwrap(), vec![1, 0, 1]);
    }

    #[tokio::test]
    async fn requested_region_ids_always_report_regardless_of_cadence() {
        let view = Arc::new(InMemoryStoreView::new(store(1, "h1", 1)));
        let regions = Arc::new(InMemoryRegionSource::new(vec![RegionInfo {
            id: 10,
            state: RegionState::Normal,
            leader_store_id: 1,
            snapshot_epoch_version: 1,
            raft_status: None,
            index_status: None,
        }]));
        let mut config = HeartbeatConfig::default();
        config.store_heartbeat_report_region_multiple = 1000;
        let transport = Arc::new(CapturingTransport(Mutex::new(Vec::new())));
        let task = StoreHeartbeatTask::new(view, regions, transport.clone(), config);

        task.trigger(vec![10], true).await.unwrap();
        assert_eq!(*transport.0.lock().unwrap(), vec![1]);
    }
}

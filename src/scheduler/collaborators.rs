//! External collaborator boundary for the heartbeat scheduler.
//!
//! Everything here is a trait: the scheduler and its task classes never
//! talk to a real coordinator, store, or RPC stack directly. Production
//! call sites hand in their own implementations; tests hand in in-memory
//! fakes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::Result;

/// Whether the calling process currently holds cluster leadership.
///
/// Most generic task classes check this before touching their
/// `GuardedFlag`, but not all of them: `recycle_orphan`, `meta_watch_clean`,
/// and `lease` run on every non-leader too (guard-only), `vector_index_scrub`
/// runs unconditionally (neither check applies), and `store_heartbeat` never
/// consults this trait at all — a non-leader store still has to heartbeat to
/// stay visible to the coordinator. See each task class's wiring in
/// `scheduler/mod.rs` for its exact gating.
#[async_trait]
pub trait CoordinatorControl: Send + Sync {
    /// Returns `true` if this process is the current leader.
    async fn is_leader(&self) -> bool;
}

/// A single store's address as carried in heartbeat exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    /// Process-unique store id.
    pub id: i64,
    /// Raft RPC host.
    pub raft_host: String,
    /// Raft RPC port.
    pub raft_port: u16,
}

/// Lifecycle state of a region, as reported by the region metadata
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    /// Serving normally.
    Normal,
    /// Up to date but not currently serving.
    Standby,
    /// Retired; kept around for the deletion grace period.
    Tombstone,
    /// Mid-split; excluded from heartbeat region metrics.
    Splitting,
    /// Mid-merge; excluded from heartbeat region metrics.
    Merging,
}

/// Raft node status for a region, opaque beyond whatever the raft
/// collaborator chooses to report — this crate doesn't interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaftNodeStatus {
    /// Store id this region's raft group currently considers leader.
    pub leader_store_id: i64,
    /// Current raft term.
    pub term: i64,
}

/// Per-role index status (vector or document), opaque beyond whatever the
/// index collaborator chooses to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStatus {
    /// Whether the index has finished building and is serving queries.
    pub is_ready: bool,
    /// Whether a (re)build is currently in progress.
    pub is_building: bool,
}

/// A region's heartbeat-relevant metadata, as the local store knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionInfo {
    /// Region id.
    pub id: i64,
    /// Current lifecycle state.
    pub state: RegionState,
    /// Store id this region's raft group currently considers leader.
    pub leader_store_id: i64,
    /// The region's own recorded snapshot epoch version, before any
    /// `RaftSnapshotPolicy` override is applied.
    pub snapshot_epoch_version: i64,
    /// Raft node status, present only for raft-engine regions in
    /// `Normal`/`Standby`/`Tombstone` state.
    pub raft_status: Option<RaftNodeStatus>,
    /// Per-role index status, present only for index-cluster-role stores.
    pub index_status: Option<IndexStatus>,
}

/// Supplies region metadata for heartbeat reporting. A separate boundary
/// from [`StoreView`] since regions and stores are reconciled independently.
pub trait RegionSource: Send + Sync {
    /// All region ids this store currently hosts.
    fn all_region_ids(&self) -> Vec<i64>;
    /// Looks up one region's metadata, `None` if it no longer exists
    /// locally (e.g. already fully deleted).
    fn region(&self, id: i64) -> Option<RegionInfo>;
}

/// In-memory `RegionSource` for tests and the demo binary.
#[derive(Default)]
pub struct InMemoryRegionSource {
    regions: Mutex<HashMap<i64, RegionInfo>>,
}

impl InMemoryRegionSource {
    /// Builds a source seeded with the given regions.
    pub fn new(regions: impl IntoIterator<Item = RegionInfo>) -> Self {
        Self {
            regions: Mutex::new(regions.into_iter().map(|r| (r.id, r)).collect()),
        }
    }
}

impl RegionSource for InMemoryRegionSource {
    fn all_region_ids(&self) -> Vec<i64> {
        self.regions.lock().unwrap().keys().copied().collect()
    }

    fn region(&self, id: i64) -> Option<RegionInfo> {
        self.regions.lock().unwrap().get(&id).cloned()
    }
}

/// Request sent by `store_heartbeat`'s task body.
#[derive(Debug, Clone)]
pub struct StoreHeartbeatRequest {
    /// This process's own store entry.
    pub self_store: StoreInfo,
    /// Regions the caller explicitly asked to report on; empty means "let
    /// the task decide", which may still end up reporting all regions.
    pub region_ids: Vec<i64>,
    /// Whether the coordinator should bump this store's epoch version.
    pub update_epoch_version: bool,
    /// `true` when `region_metrics` covers only `region_ids` rather than
    /// every region this store hosts.
    pub is_partial_region_metrics: bool,
    /// Region metrics attached to this heartbeat. Empty when this
    /// heartbeat skipped region reporting entirely.
    pub region_metrics: Vec<RegionInfo>,
}

/// Response received from the coordinator.
#[derive(Debug, Clone, Default)]
pub struct StoreHeartbeatResponse {
    /// The coordinator's full view of cluster stores.
    pub stores: Vec<StoreInfo>,
    /// Cluster-wide read-only flag.
    pub cluster_is_read_only: bool,
    /// Cluster-wide force-read-only flag (stronger than `cluster_is_read_only`).
    pub cluster_is_force_read_only: bool,
}

/// Sends the store heartbeat RPC and returns the coordinator's response.
#[async_trait]
pub trait StoreHeartbeatTransport: Send + Sync {
    /// Performs the heartbeat exchange.
    async fn send_store_heartbeat(
        &self,
        request: StoreHeartbeatRequest,
    ) -> Result<StoreHeartbeatResponse>;
}

/// The local process's view of cluster stores, reconciled against each
/// heartbeat response by `scheduler/tasks/store_heartbeat.rs`.
pub trait StoreView: Send + Sync {
    /// This process's own store id — never removed from the view even if
    /// a response's store list omits it.
    fn local_store_id(&self) -> i64;
    /// A snapshot of the locally cached store map.
    fn snapshot(&self) -> HashMap<i64, StoreInfo>;
    /// Inserts or updates a store entry.
    fn upsert(&self, store: StoreInfo);
    /// Removes a store entry.
    fn remove(&self, id: i64);
}

/// In-memory `StoreView` for tests and the demo binary.
#[derive(Default)]
pub struct InMemoryStoreView {
    local_id: i64,
    stores: Mutex<HashMap<i64, StoreInfo>>,
}

impl InMemoryStoreView {
    /// Builds a view seeded with just the local store.
    pub fn new(local: StoreInfo) -> Self {
        let mut map = HashMap::new();
        let local_id = local.id;
        map.insert(local_id, local);
        Self {
            local_id,
            stores: Mutex::new(map),
        }
    }
}

impl StoreView for InMemoryStoreView {
    fn local_store_id(&self) -> i64 {
        self.local_id
    }

    fn snapshot(&self) -> HashMap<i64, StoreInfo> {
        self.stores.lock().unwrap().clone()
    }

    fn upsert(&self, store: StoreInfo) {
        self.stores.lock().unwrap().insert(store.id, store);
    }

    fn remove(&self, id: i64) {
        self.stores.lock().unwrap().remove(&id);
    }
}

/// Generic one-shot external action, standing in for task classes that
/// are specified only by their contract with an external collaborator —
/// no further algorithm beyond "perform it". `balance_leader`,
/// `compaction`, and the rest of that family each hold one of these
/// rather than reimplementing a bespoke trait per class.
#[async_trait]
pub trait ExternalAction: Send + Sync {
    /// Performs the class's external action exactly once.
    async fn perform(&self) -> Result<()>;
}

/// An `ExternalAction` that always succeeds without doing anything, for
/// wiring up the demo binary and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAction;

#[async_trait]
impl ExternalAction for NoopAction {
    async fn perform(&self) -> Result<()> {
        Ok(())
    }
}

/// Test/demo `CoordinatorControl` backed by a plain flag.
pub struct StaticLeader(std::sync::atomic::AtomicBool);

impl StaticLeader {
    /// Builds a fake collaborator that always reports `is_leader`.
    pub fn new(is_leader: bool) -> Self {
        Self(std::sync::atomic::AtomicBool::new(is_leader))
    }

    /// Flips the reported leadership state.
    pub fn set(&self, is_leader: bool) {
        self.0.store(is_leader, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl CoordinatorControl for StaticLeader {
    async fn is_leader(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Convenience alias used by the scheduler to hold a shared collaborator.
pub type Shared<T> = Arc<T>;

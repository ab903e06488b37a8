//! The twelve periodic task classes: `store_heartbeat` is fully
//! specified; the remaining eleven are contract-only and share
//! [`generic::GenericPeriodicTask`], each wired with its own leader-gate
//! and guard combination.

pub mod generic;
pub mod store_heartbeat;

pub use generic::GenericPeriodicTask;
pub use store_heartbeat::StoreHeartbeatTask;

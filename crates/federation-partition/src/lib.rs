//! Partition detection for the stores participating in a transaction.
//!
//! Each store registers a [`HealthProbe`]. A background heartbeat probes every
//! store on a fixed interval; the executor asks [`PartitionMonitor::check`]
//! before it touches a store and refuses to proceed when reachability can't be
//! confirmed.

mod config;
mod error;
mod monitor;
mod probe;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::MonitorConfig;
pub use error::ProbeError;
pub use monitor::{PartitionMonitor, StoreHealth};
pub use probe::HealthProbe;

//! Periodic samplers
//!
//! - `network`: reachability of the fixed host set, one row per host per tick
//! - `system`: local resource health, one row per tick plus threshold checks
//!
//! Each sampler runs as its own task; a failed tick is logged and the next
//! tick proceeds.

pub mod network;
pub mod probe;
pub mod resources;
pub mod system;

pub use network::{NetworkSampler, ProbeTarget};
pub use probe::{PingExecutor, ProbeError, ProbeExecutor, ProbeStats};
pub use resources::{ResourceError, ResourceReader, ResourceReading, SysinfoReader};
pub use system::SystemSampler;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Resource read failed: {0}")]
    Resources(#[from] ResourceError),
    #[error("Store write failed: {0}")]
    Store(#[from] StoreError),
}

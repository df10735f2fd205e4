//! # EsoxSolutions.ResourcePool
//!
//! Thread-safe, bounded pool for expensive, reusable resources such as
//! connections or large buffers.
//!
//! ## Features
//!
//! - Bounded capacity with on-demand growth up to `max_size`
//! - Blocking acquire with timeout, plus async and non-blocking variants
//! - Reset and validation of resources on return
//! - Background eviction of stale or invalid idle resources
//! - Automatic release via RAII guards
//! - Statistics, health status and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{Pool, PoolConfiguration, Resource, ResetError};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::time::Duration;
//!
//! struct Buffer {
//!     id: u64,
//!     data: Vec<u8>,
//! }
//!
//! impl Resource for Buffer {
//!     type Id = u64;
//!     fn identity(&self) -> u64 { self.id }
//!     fn reset(&mut self) -> Result<(), ResetError> {
//!         self.data.clear();
//!         Ok(())
//!     }
//!     fn validate(&self) -> bool { true }
//! }
//!
//! static NEXT: AtomicU64 = AtomicU64::new(0);
//!
//! let pool = Pool::new(
//!     PoolConfiguration::new()
//!         .with_max_size(4)
//!         .with_factory(|| Ok(Buffer { id: NEXT.fetch_add(1, Ordering::Relaxed), data: Vec::new() })),
//! )
//! .unwrap();
//!
//! {
//!     let mut buf = pool.get(Duration::from_secs(1)).unwrap();
//!     buf.data.extend_from_slice(b"hello");
//!     // Released (and reset) when `buf` goes out of scope
//! }
//! assert_eq!(pool.status().idle, 1);
//! ```

mod config;
mod errors;
mod eviction;
mod health;
mod ledger;
mod metrics;
mod pool;
mod resource;

pub use config::{Factory, PoolConfiguration};
pub use errors::{PoolError, PoolResult};
pub use eviction::EvictionReport;
pub use health::HealthStatus;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::{PoolStatistics, PoolStatus};
pub use pool::{Pool, PooledResource};
pub use resource::{FactoryError, ResetError, Resource};

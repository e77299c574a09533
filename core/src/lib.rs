//! # Lilium Core
//!
//! Engine-agnostic building blocks shared by the Lilium crates: thread-safe
//! object pools with leak detection, and optional profiling instrumentation.

pub mod pool;
pub mod profiling;

pub use pool::{
    LeakHandler, LeakReport, Lease, Pool, PoolDescriptor, PoolId, PoolStats, Poolable,
};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("Lilium Core v{} initialized", VERSION);
}

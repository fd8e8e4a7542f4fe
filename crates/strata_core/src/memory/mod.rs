//! # Memory Management
//!
//! Pooled scratch buffers for allocation-frugal grid generation.
//!
//! ## Design Philosophy
//!
//! Buffers are allocated on first use and then kept. During steady-state
//! generation:
//! - No heap allocations once buffers have grown to the working size
//! - Buffers are only grown, never shrunk
//! - One pool slot is held per in-flight request

mod pool;

pub use pool::{ArrayPool, ArraysCache, CacheHandle, PoolError, DEFAULT_POOL_SIZE};

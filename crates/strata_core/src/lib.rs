//! # STRATA Core
//!
//! Engine primitives shared by the world-generation crates.
//!
//! ## Architecture Rules
//!
//! 1. **No per-call heap allocations in hot paths** - scratch memory is pooled
//! 2. **Explicit ownership** - a pool slot belongs to exactly one caller at a time
//! 3. **No process-wide statics** - pools are created with the world that owns them
//!
//! ## Example
//!
//! ```rust
//! use strata_core::ArrayPool;
//!
//! let pool = ArrayPool::new(4);
//! let mut cache = pool.acquire().expect("fresh pool has free slots");
//! let buf = cache.take(256);
//! assert_eq!(buf.len(), 256);
//! cache.recycle(buf);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod memory;

pub use memory::{ArrayPool, ArraysCache, CacheHandle, PoolError, DEFAULT_POOL_SIZE};

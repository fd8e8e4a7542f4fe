//! # Array Pool
//!
//! Fixed-slot pool of reusable integer scratch buffers.
//!
//! Each slot is an [`ArraysCache`]. A generation request claims one slot for
//! its whole duration and draws every intermediate grid from it, so the
//! number of slots bounds the number of concurrent requests, not the depth of
//! the layer chain.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use thiserror::Error;

/// Default number of slots in an [`ArrayPool`].
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Errors raised by the array pool.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Every slot is currently held by another request.
    #[error("array pool exhausted: all {capacity} slots are in use")]
    ResourceExhausted {
        /// Total number of slots in the pool.
        capacity: usize,
    },
}

/// A set of reusable `i32` buffers owned by one pool slot.
///
/// Buffers handed out by [`take`](Self::take) must be given back with
/// [`recycle`](Self::recycle) to be reused. A buffer that is dropped instead
/// is simply lost to the cache and reallocated on demand.
#[derive(Debug, Default)]
pub struct ArraysCache {
    /// Buffers available for reuse.
    spare: Vec<Vec<i32>>,
    /// Buffers currently handed out.
    outstanding: usize,
    /// Most buffers ever outstanding at once.
    high_water: usize,
}

impl ArraysCache {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            spare: Vec::new(),
            outstanding: 0,
            high_water: 0,
        }
    }

    /// Takes a zero-filled buffer of exactly `len` elements.
    ///
    /// Picks the smallest spare buffer whose capacity already fits `len`;
    /// if none fits, the largest spare is grown.
    pub fn take(&mut self, len: usize) -> Vec<i32> {
        let best_fit = self
            .spare
            .iter()
            .enumerate()
            .filter(|(_, buf)| buf.capacity() >= len)
            .min_by_key(|(_, buf)| buf.capacity())
            .map(|(index, _)| index);
        let pick = best_fit.or_else(|| {
            self.spare
                .iter()
                .enumerate()
                .max_by_key(|(_, buf)| buf.capacity())
                .map(|(index, _)| index)
        });

        let mut buf = match pick {
            Some(index) => self.spare.swap_remove(index),
            None => Vec::with_capacity(len),
        };
        buf.clear();
        buf.resize(len, 0);

        self.outstanding += 1;
        self.high_water = self.high_water.max(self.outstanding);
        buf
    }

    /// Returns a buffer to the cache for later reuse.
    pub fn recycle(&mut self, buf: Vec<i32>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.spare.push(buf);
    }

    /// Number of buffers waiting for reuse.
    #[inline]
    #[must_use]
    pub fn spare_count(&self) -> usize {
        self.spare.len()
    }

    /// Total retained capacity, in elements.
    #[must_use]
    pub fn retained_capacity(&self) -> usize {
        self.spare.iter().map(Vec::capacity).sum()
    }

    /// Most buffers that were ever outstanding at the same time.
    #[inline]
    #[must_use]
    pub const fn high_water(&self) -> usize {
        self.high_water
    }
}

/// A fixed-size pool of [`ArraysCache`] slots.
///
/// # Thread Safety
///
/// Scan-and-claim and release run under a single `parking_lot::Mutex`.
/// Once claimed, a cache is owned by its [`CacheHandle`] and used without
/// any further locking.
///
/// # Example
///
/// ```rust
/// use strata_core::{ArrayPool, PoolError};
///
/// let pool = ArrayPool::new(1);
/// let held = pool.acquire().unwrap();
/// assert_eq!(pool.acquire().unwrap_err(), PoolError::ResourceExhausted { capacity: 1 });
/// pool.release(held);
/// assert!(pool.acquire().is_ok());
/// ```
#[derive(Debug)]
pub struct ArrayPool {
    /// `None` marks a slot that is currently held.
    slots: Mutex<Vec<Option<ArraysCache>>>,
    /// Total number of slots.
    capacity: usize,
}

impl ArrayPool {
    /// Creates a pool with `capacity` empty slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        let slots = (0..capacity).map(|_| Some(ArraysCache::new())).collect();
        Self {
            slots: Mutex::new(slots),
            capacity,
        }
    }

    /// Returns the total number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of slots not currently held.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// Claims the first free slot.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ResourceExhausted`] if every slot is held.
    pub fn acquire(&self) -> Result<CacheHandle<'_>, PoolError> {
        let mut slots = self.slots.lock();
        for (index, slot) in slots.iter_mut().enumerate() {
            if let Some(cache) = slot.take() {
                return Ok(CacheHandle {
                    pool: self,
                    index,
                    cache: Some(cache),
                });
            }
        }
        drop(slots);

        tracing::warn!(capacity = self.capacity, "array pool exhausted");
        Err(PoolError::ResourceExhausted {
            capacity: self.capacity,
        })
    }

    /// Returns a slot to the pool. Equivalent to dropping the handle.
    pub fn release(&self, handle: CacheHandle<'_>) {
        debug_assert!(
            std::ptr::eq(handle.pool, self),
            "handle released to a pool that did not issue it"
        );
        drop(handle);
    }

    fn put_back(&self, index: usize, cache: ArraysCache) {
        let mut slots = self.slots.lock();
        debug_assert!(slots[index].is_none(), "slot {index} released twice");
        slots[index] = Some(cache);
    }
}

impl Default for ArrayPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

/// Exclusive ownership of one pool slot.
///
/// Dereferences to the slot's [`ArraysCache`]. The slot, with every buffer
/// recycled into it, goes back to the pool when the handle is dropped.
#[derive(Debug)]
pub struct CacheHandle<'p> {
    pool: &'p ArrayPool,
    index: usize,
    cache: Option<ArraysCache>,
}

impl CacheHandle<'_> {
    /// Index of the claimed slot.
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.index
    }
}

impl Deref for CacheHandle<'_> {
    type Target = ArraysCache;

    fn deref(&self) -> &ArraysCache {
        // Only `Drop` empties the option.
        self.cache.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for CacheHandle<'_> {
    fn deref_mut(&mut self) -> &mut ArraysCache {
        self.cache.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for CacheHandle<'_> {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.take() {
            self.pool.put_back(self.index, cache);
        }
    }
}

//! # Seeded Layer RNG
//!
//! Deterministic per-cell pseudo-random stream used by every layer stage.
//!
//! ## Determinism Guarantee
//!
//! The stream is a 64-bit linear congruential generator with fixed
//! constants. Given the same world seed, layer seed, cell coordinate and
//! call sequence it produces **exactly** the same values on any platform.
//! Worlds are reproduced from the seed alone, so the constants and the
//! mixing order below must never change.

/// LCG multiplier.
const MULTIPLIER: i64 = 6_364_136_223_846_793_005;
/// LCG increment.
const INCREMENT: i64 = 1_442_695_040_888_963_407;

/// One LCG step: `s * (s * M + A)`, wrapping.
#[inline]
const fn step(s: i64) -> i64 {
    s.wrapping_mul(s.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT))
}

/// Scrambles a layer's configured seed into its base seed.
#[must_use]
pub const fn scramble_layer_seed(seed: i64) -> i64 {
    let mut base = seed;
    base = step(base).wrapping_add(seed);
    base = step(base).wrapping_add(seed);
    base = step(base).wrapping_add(seed);
    base
}

/// Mixes the world seed with a scrambled layer seed.
#[must_use]
pub const fn world_gen_seed(world_seed: i64, base_seed: i64) -> i64 {
    let mut mixed = world_seed;
    mixed = step(mixed).wrapping_add(base_seed);
    mixed = step(mixed).wrapping_add(base_seed);
    mixed = step(mixed).wrapping_add(base_seed);
    mixed
}

/// Per-call random stream for one layer.
///
/// Layers hold only the immutable world-generation seed; each grid request
/// creates its own `SeededRng` on the stack, so concurrent requests never
/// share RNG state.
///
/// # Example
///
/// ```rust
/// use strata_procedural::rng::SeededRng;
///
/// let mut rng = SeededRng::for_layer(12345, 1);
/// rng.init_chunk_seed(0, 0);
/// assert_eq!(rng.next_int(10), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeededRng {
    world_gen_seed: i64,
    chunk_seed: i64,
}

impl SeededRng {
    /// Creates a stream from an already mixed world-generation seed.
    #[inline]
    #[must_use]
    pub const fn new(world_gen_seed: i64) -> Self {
        Self {
            world_gen_seed,
            chunk_seed: 0,
        }
    }

    /// Creates a stream for a layer with seed `layer_seed` in world `world_seed`.
    #[must_use]
    pub const fn for_layer(world_seed: i64, layer_seed: i64) -> Self {
        Self::new(world_gen_seed(world_seed, scramble_layer_seed(layer_seed)))
    }

    /// Returns the mixed world-generation seed.
    #[inline]
    #[must_use]
    pub const fn world_gen_seed(&self) -> i64 {
        self.world_gen_seed
    }

    /// Re-seeds the stream for the cell at absolute coordinate `(x, z)`.
    #[inline]
    pub fn init_chunk_seed(&mut self, x: i64, z: i64) {
        let mut seed = self.world_gen_seed;
        seed = step(seed).wrapping_add(x);
        seed = step(seed).wrapping_add(z);
        seed = step(seed).wrapping_add(x);
        seed = step(seed).wrapping_add(z);
        self.chunk_seed = seed;
    }

    /// Draws the next integer in `[0, bound)`.
    ///
    /// `bound` must be positive.
    #[inline]
    pub fn next_int(&mut self, bound: i32) -> i32 {
        debug_assert!(bound > 0, "bound must be positive, got {bound}");
        let bound = i64::from(bound);
        let mut value = (self.chunk_seed >> 24) % bound;
        if value < 0 {
            value += bound;
        }
        self.chunk_seed = step(self.chunk_seed).wrapping_add(self.world_gen_seed);
        // |value| < bound <= i32::MAX
        value as i32
    }

    /// Picks `a` or `b` with equal probability.
    #[inline]
    pub fn choose2(&mut self, a: i32, b: i32) -> i32 {
        if self.next_int(2) == 0 {
            a
        } else {
            b
        }
    }

    /// Picks one of four values with equal probability.
    #[inline]
    pub fn choose4(&mut self, a: i32, b: i32, c: i32, d: i32) -> i32 {
        match self.next_int(4) {
            0 => a,
            1 => b,
            2 => c,
            _ => d,
        }
    }
}

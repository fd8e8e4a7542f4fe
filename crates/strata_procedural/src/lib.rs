//! # STRATA Procedural Generation
//!
//! Deterministic biome generation and chunk population for block worlds.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and configuration always produce the same biomes
//! 2. **Window independent**: A cell's biome never depends on the requested rectangle
//! 3. **Shareable**: One generator serves many threads; scratch memory is pooled
//! 4. **Bounded population**: Decoration touches only a 2x2 chunk window
//!
//! ## Core Components
//!
//! - `SeededRng`: Positional LCG used by every layer stage
//! - `LayerStack`: Chain of biome layer stages ending in a Voronoi zoom
//! - `BiomeGridGenerator`: Turns layer output into saved biome ids
//! - `PopulationWindow`: 2x2 chunk window and block-replacement sweep
//! - `World`: Host facade over generator, chunk store and window
//!
//! ## Example
//!
//! ```rust
//! use strata_procedural::{Rect, World, WorldConfig, MemoryChunkStore};
//!
//! let config = WorldConfig::with_seed(12345);
//! let world = World::new(&config, MemoryChunkStore::new()).unwrap();
//!
//! let small = world.get_grid(Rect::new(0, 0, 16, 16)).unwrap();
//! let large = world.get_grid(Rect::new(0, 0, 32, 32)).unwrap();
//! assert_eq!(small.get(5, 9), large.get(5, 9));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod biome;
pub mod chunk;
pub mod config;
pub mod error;
pub mod generator;
pub mod layer;
pub mod population;
pub mod rng;
pub mod world;

pub use biome::{BiomeConfig, BiomeId, BiomeIds, BiomeRegistry, DefaultBiome, ReplaceRule, ReplaceTable};
pub use chunk::{
    Block, Chunk, ChunkCoord, ChunkStore, Material, MemoryChunkStore, CHUNK_HEIGHT, CHUNK_SIZE,
    WORLD_HEIGHT,
};
pub use config::{BiomeDef, WorldConfig};
pub use error::{GenError, GenResult};
pub use generator::{BiomeGrid, BiomeGridGenerator};
pub use layer::{LayerSpec, LayerStack, Rect, Stage};
pub use population::{BiomeSource, BoundsMode, PopulationWindow};
pub use rng::SeededRng;
pub use world::World;

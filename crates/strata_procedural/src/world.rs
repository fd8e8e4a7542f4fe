//! # World
//!
//! Host-facing facade: one generator, one chunk store and one population
//! window per world. Everything a host needs goes through here.
//!
//! ## Example
//!
//! ```rust
//! use strata_procedural::{Block, ChunkCoord, MemoryChunkStore, World, WorldConfig};
//!
//! let mut world = World::new(&WorldConfig::default(), MemoryChunkStore::new()).unwrap();
//! world
//!     .populate(ChunkCoord::new(0, 0), |world| {
//!         world.set_block(20, 64, 20, Block::STONE)
//!     })
//!     .unwrap();
//! assert_eq!(world.block(20, 64, 20), Some(Block::STONE));
//! ```

use std::sync::Arc;

use strata_core::ArrayPool;

use crate::biome::BiomeId;
use crate::chunk::{Block, ChunkCoord, ChunkStore, Material};
use crate::config::WorldConfig;
use crate::error::{GenError, GenResult};
use crate::generator::{BiomeGrid, BiomeGridGenerator};
use crate::layer::Rect;
use crate::population::{BiomeSource, BoundsMode, PopulationWindow};

/// A generated world backed by a chunk store.
#[derive(Debug)]
pub struct World<S: ChunkStore> {
    seed: i64,
    generator: Arc<BiomeGridGenerator>,
    store: S,
    window: PopulationWindow,
    biome_source: BiomeSource,
}

impl<S: ChunkStore> World<S> {
    /// Builds a world from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for an invalid biome list or
    /// layer chain, and [`GenError::BiomeNotFound`] if the chain emits an
    /// unregistered id.
    pub fn new(config: &WorldConfig, store: S) -> GenResult<Self> {
        config.validate()?;
        let registry = Arc::new(config.build_registry()?);
        let stack = config.build_stack()?;
        let pool = Arc::new(ArrayPool::new(config.pool_size));
        let generator = Arc::new(BiomeGridGenerator::new(stack, registry, pool)?);
        Ok(Self::with_generator(config, generator, store))
    }

    /// Builds a world around an existing generator.
    #[must_use]
    pub fn with_generator(
        config: &WorldConfig,
        generator: Arc<BiomeGridGenerator>,
        store: S,
    ) -> Self {
        let biome_source = if config.populate_using_saved_biomes {
            BiomeSource::Saved
        } else {
            BiomeSource::Generated
        };
        tracing::info!(seed = config.seed, ?biome_source, "world created");
        Self {
            seed: config.seed,
            generator,
            store,
            window: PopulationWindow::new(BoundsMode::from_bounds_check(
                config.population_bounds_check,
            )),
            biome_source,
        }
    }

    /// The world seed.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> i64 {
        self.seed
    }

    /// The shared biome generator.
    #[inline]
    #[must_use]
    pub fn generator(&self) -> &Arc<BiomeGridGenerator> {
        &self.generator
    }

    /// The chunk store.
    #[inline]
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the chunk store.
    #[inline]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The population window.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> &PopulationWindow {
        &self.window
    }

    /// Saved biome ids for `area`.
    ///
    /// # Errors
    ///
    /// See [`BiomeGridGenerator::get_grid`].
    pub fn get_grid(&self, area: Rect) -> GenResult<BiomeGrid> {
        self.generator.get_grid(area)
    }

    /// Saved biome id at a world position.
    ///
    /// # Errors
    ///
    /// See [`BiomeGridGenerator::biome_at`].
    pub fn biome_at(&self, x: i32, z: i32) -> GenResult<BiomeId> {
        self.generator.biome_at(x, z)
    }

    /// Makes sure a chunk is loaded and writes its saved biome array.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ChunkUnavailable`] if the store cannot provide
    /// the chunk, or a generator error.
    pub fn generate_chunk_biomes(&mut self, coord: ChunkCoord) -> GenResult<()> {
        let grid = self.generator.chunk_biomes(coord)?;
        if let Some(chunk) = self.store.chunk_mut(coord) {
            chunk.fill_biomes(grid.cells());
            return Ok(());
        }
        let mut chunk = self
            .store
            .checkout(coord)
            .ok_or(GenError::ChunkUnavailable {
                x: coord.x,
                z: coord.z,
            })?;
        chunk.fill_biomes(grid.cells());
        self.store.restore(chunk);
        Ok(())
    }

    /// Starts a population pass at `top_left`.
    ///
    /// # Errors
    ///
    /// See [`PopulationWindow::start`].
    pub fn start_population(&mut self, top_left: ChunkCoord) -> GenResult<()> {
        self.window.start(&mut self.store, top_left)
    }

    /// Ends the running population pass.
    ///
    /// # Errors
    ///
    /// See [`PopulationWindow::end`].
    pub fn end_population(&mut self) -> GenResult<()> {
        self.window.end(&mut self.store)
    }

    /// Runs the block-replacement sweep for the window at `top_left`.
    ///
    /// # Errors
    ///
    /// See [`PopulationWindow::replace_blocks`].
    pub fn replace_blocks(&mut self, top_left: ChunkCoord) -> GenResult<usize> {
        self.window.replace_blocks(
            &mut self.store,
            &self.generator,
            self.biome_source,
            top_left,
        )
    }

    /// Runs a whole population pass: start, `decorate`, replacement sweep,
    /// end.
    ///
    /// The pass is ended even if `decorate` or the sweep fails; the first
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Any error from starting, decorating, sweeping or ending the pass.
    pub fn populate<T, F>(&mut self, top_left: ChunkCoord, decorate: F) -> GenResult<T>
    where
        F: FnOnce(&mut Self) -> GenResult<T>,
    {
        self.start_population(top_left)?;
        let result = decorate(self).and_then(|value| {
            self.replace_blocks(top_left)?;
            Ok(value)
        });
        let ended = self.end_population();
        let value = result?;
        ended?;
        Ok(value)
    }

    /// Block at a world position, if loaded.
    #[must_use]
    pub fn block(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        self.window.block(&self.store, x, y, z)
    }

    /// Material at a world position; unloaded positions read as air.
    #[must_use]
    pub fn material(&self, x: i32, y: i32, z: i32) -> Material {
        self.window.material(&self.store, x, y, z)
    }

    /// Returns true for air or unloaded positions.
    #[must_use]
    pub fn is_empty(&self, x: i32, y: i32, z: i32) -> bool {
        self.window.is_empty(&self.store, x, y, z)
    }

    /// Writes a block at a world position.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::OutOfBounds`] if the position is not loaded.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> GenResult<()> {
        self.window.set_block(&mut self.store, x, y, z, block)
    }

    /// Light level at a world position.
    #[must_use]
    pub fn light_level(&self, x: i32, y: i32, z: i32) -> Option<u8> {
        self.window.light_level(&self.store, x, y, z)
    }

    /// Returns true if the position is loaded.
    #[must_use]
    pub fn is_loaded(&self, x: i32, y: i32, z: i32) -> bool {
        self.window.is_loaded(&self.store, x, y, z)
    }

    /// See [`PopulationWindow::highest_block_y`].
    #[must_use]
    pub fn highest_block_y(&self, x: i32, z: i32) -> Option<i32> {
        self.window.highest_block_y(&self.store, x, z)
    }

    /// See [`PopulationWindow::solid_height`].
    #[must_use]
    pub fn solid_height(&self, x: i32, z: i32) -> Option<i32> {
        self.window.solid_height(&self.store, x, z)
    }

    /// See [`PopulationWindow::liquid_height`].
    #[must_use]
    pub fn liquid_height(&self, x: i32, z: i32) -> Option<i32> {
        self.window.liquid_height(&self.store, x, z)
    }

    /// Attaches tile metadata to a block.
    ///
    /// # Errors
    ///
    /// See [`PopulationWindow::attach_metadata`].
    pub fn attach_metadata(&mut self, x: i32, y: i32, z: i32, tag: toml::Table) -> GenResult<bool> {
        self.window.attach_metadata(&mut self.store, x, y, z, tag)
    }

    /// Tile metadata of a block.
    #[must_use]
    pub fn metadata(&self, x: i32, y: i32, z: i32) -> Option<toml::Table> {
        self.window.metadata(&self.store, x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::MemoryChunkStore;

    fn world() -> World<MemoryChunkStore> {
        World::new(&WorldConfig::default(), MemoryChunkStore::new()).unwrap()
    }

    #[test]
    fn test_populate_ends_pass_on_error() {
        let mut world = world();
        let err = world
            .populate(ChunkCoord::new(0, 0), |world| {
                world.set_block(1, 1, 1, Block::STONE)?;
                world.set_block(500, 1, 1, Block::STONE)
            })
            .unwrap_err();
        assert_eq!(err, GenError::OutOfBounds { x: 500, y: 1, z: 1 });
        assert!(!world.window().is_populating());
        assert_eq!(world.store().len(), 4);
        assert_eq!(world.block(1, 1, 1), Some(Block::STONE));
    }

    #[test]
    fn test_populate_returns_value() {
        let mut world = world();
        let placed = world
            .populate(ChunkCoord::new(-1, -1), |world| {
                let mut placed = 0;
                for x in -16..16 {
                    world.set_block(x, 70, -3, Block::GRAVEL)?;
                    placed += 1;
                }
                Ok(placed)
            })
            .unwrap();
        assert_eq!(placed, 32);
        assert_eq!(world.material(-16, 70, -3), Material::Solid);
    }

    #[test]
    fn test_generate_chunk_biomes() {
        let mut world = world();
        let coord = ChunkCoord::new(3, -7);
        world.generate_chunk_biomes(coord).unwrap();
        let chunk = world.store().chunk(coord).unwrap();
        let expected = world.get_grid(Rect::new(48, -112, 16, 16)).unwrap();
        assert_eq!(&chunk.biomes()[..], expected.cells());
        assert_eq!(chunk.biome(0, 0), world.biome_at(48, -112).unwrap());
    }
}

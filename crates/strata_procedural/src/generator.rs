//! # Biome Grid Generator
//!
//! Drives a [`LayerStack`] and translates its generation ids into saved
//! biome ids through a lookup table covering the whole generation-id range.
//!
//! The generator is immutable once built. It is `Send + Sync` and meant to
//! be shared by reference or `Arc` across generation threads; the array
//! pool is the only point where concurrent requests meet.

use std::sync::Arc;

use strata_core::ArrayPool;

use crate::biome::{BiomeConfig, BiomeId, BiomeRegistry, MAX_GENERATION_IDS};
use crate::chunk::{Chunk, ChunkCoord, CHUNK_SIZE};
use crate::error::{GenError, GenResult};
use crate::layer::{LayerStack, Rect};

/// A row-major grid of saved biome ids anchored at a world position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BiomeGrid {
    area: Rect,
    cells: Vec<BiomeId>,
}

impl BiomeGrid {
    /// Rectangle covered by the grid.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> Rect {
        self.area
    }

    /// All cells, row-major.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[BiomeId] {
        &self.cells
    }

    /// Consumes the grid, returning its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<BiomeId> {
        self.cells
    }

    /// Biome at world position `(x, z)`, if the grid covers it.
    #[must_use]
    pub fn get(&self, x: i32, z: i32) -> Option<BiomeId> {
        if !self.area.contains(x, z) {
            return None;
        }
        let col = (i64::from(x) - i64::from(self.area.x)) as usize;
        let row = (i64::from(z) - i64::from(self.area.z)) as usize;
        self.cells.get(col + row * self.area.width).copied()
    }
}

/// Computes biome grids for a world.
#[derive(Debug)]
pub struct BiomeGridGenerator {
    stack: LayerStack,
    registry: Arc<BiomeRegistry>,
    pool: Arc<ArrayPool>,
    /// Generation id -> saved id.
    remap: Box<[Option<BiomeId>]>,
}

impl BiomeGridGenerator {
    /// Creates a generator.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::BiomeNotFound`] if the chain can emit a generation
    /// id that has no registered biome.
    pub fn new(
        stack: LayerStack,
        registry: Arc<BiomeRegistry>,
        pool: Arc<ArrayPool>,
    ) -> GenResult<Self> {
        let remap: Box<[Option<BiomeId>]> = (0..MAX_GENERATION_IDS)
            .map(|id| registry.saved_id(id))
            .collect();

        for generation_id in stack.emitted_ids() {
            let known = usize::try_from(generation_id)
                .ok()
                .and_then(|id| remap.get(id).copied().flatten())
                .is_some();
            if !known {
                return Err(GenError::BiomeNotFound { generation_id });
            }
        }

        tracing::debug!(
            seed = stack.world_seed(),
            layers = stack.depth(),
            biomes = registry.len(),
            pool_slots = pool.capacity(),
            "biome generator ready"
        );
        Ok(Self {
            stack,
            registry,
            pool,
            remap,
        })
    }

    /// The layer chain.
    #[inline]
    #[must_use]
    pub const fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// The biome registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &BiomeRegistry {
        &self.registry
    }

    /// The scratch buffer pool.
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ArrayPool {
        &self.pool
    }

    /// Raw generation ids for `area`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ResourceExhausted`] if no pool slot is free.
    pub fn generation_ids(&self, area: Rect) -> GenResult<Vec<i32>> {
        self.stack.generate(&self.pool, area)
    }

    /// Saved biome ids for `area`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ResourceExhausted`] if no pool slot is free, or
    /// [`GenError::BiomeNotFound`] for an unregistered generation id.
    pub fn get_grid(&self, area: Rect) -> GenResult<BiomeGrid> {
        let mut cache = self.pool.acquire()?;
        let raw = self.stack.get_grid(&mut cache, area);
        let cells = raw
            .iter()
            .map(|&generation_id| self.remap_id(generation_id))
            .collect::<GenResult<Vec<_>>>();
        cache.recycle(raw);
        Ok(BiomeGrid { area, cells: cells? })
    }

    /// Saved biome id at a single world position.
    ///
    /// # Errors
    ///
    /// See [`get_grid`](Self::get_grid).
    pub fn biome_at(&self, x: i32, z: i32) -> GenResult<BiomeId> {
        let grid = self.generation_ids(Rect::new(x, z, 1, 1))?;
        self.remap_id(grid[0])
    }

    /// Biome configuration at a single world position.
    ///
    /// # Errors
    ///
    /// See [`get_grid`](Self::get_grid).
    pub fn biome_config_at(&self, x: i32, z: i32) -> GenResult<&BiomeConfig> {
        let grid = self.generation_ids(Rect::new(x, z, 1, 1))?;
        self.registry.by_generation(grid[0])
    }

    /// The 16x16 saved-id grid of one chunk.
    ///
    /// # Errors
    ///
    /// See [`get_grid`](Self::get_grid).
    pub fn chunk_biomes(&self, coord: ChunkCoord) -> GenResult<BiomeGrid> {
        self.get_grid(Rect::new(
            coord.world_x(),
            coord.world_z(),
            CHUNK_SIZE,
            CHUNK_SIZE,
        ))
    }

    /// Writes the chunk's saved biome array.
    ///
    /// # Errors
    ///
    /// See [`get_grid`](Self::get_grid).
    pub fn fill_chunk_biomes(&self, chunk: &mut Chunk) -> GenResult<()> {
        let grid = self.chunk_biomes(chunk.coord())?;
        chunk.fill_biomes(grid.cells());
        Ok(())
    }

    #[inline]
    fn remap_id(&self, generation_id: i32) -> GenResult<BiomeId> {
        usize::try_from(generation_id)
            .ok()
            .and_then(|id| self.remap.get(id).copied().flatten())
            .ok_or(GenError::BiomeNotFound { generation_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{BiomeIds, DefaultBiome};
    use crate::layer::Stage;

    fn generator(seed: i64) -> BiomeGridGenerator {
        let stack = LayerStack::overworld(seed).unwrap();
        BiomeGridGenerator::new(
            stack,
            Arc::new(BiomeRegistry::with_defaults()),
            Arc::new(ArrayPool::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BiomeGridGenerator>();
    }

    #[test]
    fn test_unregistered_emitted_id_is_rejected() {
        let stack = LayerStack::builder(1)
            .source(1, Stage::Base { biomes: vec![1, 8] })
            .build()
            .unwrap();
        let err = BiomeGridGenerator::new(
            stack,
            Arc::new(BiomeRegistry::with_defaults()),
            Arc::new(ArrayPool::default()),
        )
        .unwrap_err();
        assert_eq!(err, GenError::BiomeNotFound { generation_id: 8 });
    }

    #[test]
    fn test_biome_at_matches_grid() {
        let gen = generator(12345);
        let area = Rect::new(-40, 25, 48, 33);
        let grid = gen.get_grid(area).unwrap();
        assert_eq!(grid.cells().len(), area.area());

        for (x, z) in [(-40, 25), (7, 57), (0, 30), (-1, 44), (7, 25)] {
            assert_eq!(Some(gen.biome_at(x, z).unwrap()), grid.get(x, z));
        }
        assert_eq!(grid.get(8, 25), None);
    }

    #[test]
    fn test_virtual_ids_are_saved_as_parent() {
        let mut registry = BiomeRegistry::with_defaults();
        registry
            .register(BiomeConfig::new(
                "Dunes",
                BiomeIds {
                    generation: 400,
                    saved: BiomeId(DefaultBiome::Desert.id()),
                },
            ))
            .unwrap();
        let stack = LayerStack::builder(9)
            .source(1, Stage::Base { biomes: vec![400] })
            .build()
            .unwrap();
        let gen = BiomeGridGenerator::new(stack, Arc::new(registry), Arc::new(ArrayPool::new(1)))
            .unwrap();

        let grid = gen.get_grid(Rect::new(0, 0, 4, 4)).unwrap();
        assert!(grid.cells().iter().all(|&id| id == BiomeId(2)));
        assert_eq!(gen.generation_ids(Rect::new(0, 0, 1, 1)).unwrap(), [400]);
        assert_eq!(gen.biome_config_at(3, 3).unwrap().name, "Dunes");
    }

    #[test]
    fn test_chunk_biomes_fill() {
        let gen = generator(77);
        let coord = ChunkCoord::new(-3, 2);
        let grid = gen.chunk_biomes(coord).unwrap();
        assert_eq!(grid.area(), Rect::new(-48, 32, 16, 16));

        let mut chunk = Chunk::new(coord);
        gen.fill_chunk_biomes(&mut chunk).unwrap();
        assert_eq!(chunk.biome(5, 9), grid.get(-48 + 5, 32 + 9).unwrap());
        assert_eq!(&chunk.biomes()[..], grid.cells());
    }

    #[test]
    fn test_exhausted_pool_is_reported() {
        let gen = generator(5);
        let _held: Vec<_> = (0..gen.pool().capacity())
            .map(|_| gen.pool().acquire().unwrap())
            .collect();
        assert_eq!(
            gen.get_grid(Rect::new(0, 0, 4, 4)).unwrap_err(),
            GenError::ResourceExhausted { capacity: 4 }
        );
    }
}

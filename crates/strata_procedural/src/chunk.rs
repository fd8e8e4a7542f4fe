//! # Chunk System
//!
//! World data is organized into fixed-size chunks. The population window
//! borrows chunks from a [`ChunkStore`] while decorating them; the store
//! itself is provided by the host.
//!
//! ## Chunk Format
//!
//! Chunks are 16x16x256 blocks (width x depth x height). Each block is a
//! `(id, meta)` pair. Alongside the blocks a chunk carries its saved biome
//! ids, a height map, a light array and tile metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::biome::BiomeId;

/// Chunk width/depth in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Chunk height in blocks.
pub const CHUNK_HEIGHT: usize = 256;

/// Lowest valid block y.
pub const WORLD_DEPTH: i32 = 0;

/// One past the highest valid block y.
pub const WORLD_HEIGHT: i32 = CHUNK_HEIGHT as i32;

/// Columns per chunk.
pub const COLUMNS_PER_CHUNK: usize = CHUNK_SIZE * CHUNK_SIZE;

/// Total blocks per chunk.
pub const BLOCKS_PER_CHUNK: usize = COLUMNS_PER_CHUNK * CHUNK_HEIGHT;

/// Number of distinct block ids.
pub const MAX_BLOCK_ID: u16 = 4096;

/// Full light.
pub const MAX_LIGHT: u8 = 15;

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts world block coordinates to chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x >> 4,
            z: block_z >> 4,
        }
    }

    /// Returns the world X coordinate of the chunk's origin (corner).
    #[inline]
    #[must_use]
    pub const fn world_x(self) -> i32 {
        self.x.wrapping_mul(CHUNK_SIZE as i32)
    }

    /// Returns the world Z coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn world_z(self) -> i32 {
        self.z.wrapping_mul(CHUNK_SIZE as i32)
    }

    /// The chunk `dx` chunks east and `dz` chunks south of this one.
    ///
    /// Wraps at the edge of the coordinate space.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x.wrapping_add(dx), self.z.wrapping_add(dz))
    }
}

/// Broad material class of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Material {
    /// Nothing there.
    Air,
    /// Water or lava, flowing or still.
    Liquid,
    /// Passable decoration: plants, torches, snow layers.
    Decoration,
    /// Everything else.
    Solid,
}

/// Block ids that are neither air, liquid nor solid.
const DECORATION_IDS: [u16; 16] = [6, 30, 31, 32, 37, 38, 39, 40, 50, 51, 59, 78, 83, 106, 111, 175];

/// A single block in the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    /// Block type ID.
    pub id: u16,
    /// Block metadata (variant, rotation).
    #[serde(default)]
    pub meta: u8,
}

impl Block {
    /// Air block (empty).
    pub const AIR: Self = Self::new(0);
    /// Stone block.
    pub const STONE: Self = Self::new(1);
    /// Grass block.
    pub const GRASS: Self = Self::new(2);
    /// Dirt block.
    pub const DIRT: Self = Self::new(3);
    /// Bedrock block.
    pub const BEDROCK: Self = Self::new(7);
    /// Still water.
    pub const WATER: Self = Self::new(9);
    /// Still lava.
    pub const LAVA: Self = Self::new(11);
    /// Sand block.
    pub const SAND: Self = Self::new(12);
    /// Gravel block.
    pub const GRAVEL: Self = Self::new(13);
    /// Sandstone block.
    pub const SANDSTONE: Self = Self::new(24);
    /// Tall grass.
    pub const TALL_GRASS: Self = Self::with_meta(31, 1);
    /// Hardened clay.
    pub const HARDENED_CLAY: Self = Self::new(172);

    /// Creates a new block with given ID.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self { id, meta: 0 }
    }

    /// Creates a block with ID and metadata.
    #[inline]
    #[must_use]
    pub const fn with_meta(id: u16, meta: u8) -> Self {
        Self { id, meta }
    }

    /// Returns the material class of this block.
    #[must_use]
    pub fn material(self) -> Material {
        match self.id {
            0 => Material::Air,
            8..=11 => Material::Liquid,
            id if DECORATION_IDS.contains(&id) => Material::Decoration,
            _ => Material::Solid,
        }
    }

    /// Returns true if this is an air block.
    #[inline]
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.id == 0
    }

    /// Returns true for water and lava.
    #[inline]
    #[must_use]
    pub fn is_liquid(self) -> bool {
        self.material() == Material::Liquid
    }

    /// Returns true for blocks that fill their space.
    #[inline]
    #[must_use]
    pub fn is_solid(self) -> bool {
        self.material() == Material::Solid
    }
}

#[inline]
const fn block_index(x: usize, y: usize, z: usize) -> usize {
    (y * CHUNK_SIZE + z) * CHUNK_SIZE + x
}

#[inline]
const fn column_index(x: usize, z: usize) -> usize {
    z * CHUNK_SIZE + x
}

/// A chunk of world data.
///
/// Contains a 16x16x256 grid of blocks plus metadata. Local coordinates
/// outside the chunk read as air and writes to them are ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Chunk position in the world.
    coord: ChunkCoord,
    /// Block data (indexed as [y][z][x]).
    blocks: Box<[Block]>,
    /// Light level per block, same layout as `blocks`.
    light: Box<[u8]>,
    /// Saved biome id per column (indexed as [z][x]).
    biomes: [BiomeId; COLUMNS_PER_CHUNK],
    /// One above the highest non-air block per column; 0 for empty columns.
    height_map: [u16; COLUMNS_PER_CHUNK],
    /// Tile metadata keyed by block index.
    tiles: HashMap<usize, toml::Table>,
    /// Whether this chunk has been modified since loading.
    pub modified: bool,
}

impl Chunk {
    /// Creates a new empty chunk at the given coordinates.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: vec![Block::AIR; BLOCKS_PER_CHUNK].into_boxed_slice(),
            light: vec![0; BLOCKS_PER_CHUNK].into_boxed_slice(),
            biomes: [BiomeId::default(); COLUMNS_PER_CHUNK],
            height_map: [0; COLUMNS_PER_CHUNK],
            tiles: HashMap::new(),
            modified: false,
        }
    }

    /// Chunk position in the world.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Gets a block at local coordinates.
    ///
    /// # Arguments
    ///
    /// * `x` - Local X (0-15)
    /// * `y` - Y level (0-255)
    /// * `z` - Local Z (0-15)
    #[inline]
    #[must_use]
    pub fn block(&self, x: usize, y: usize, z: usize) -> Block {
        if x < CHUNK_SIZE && y < CHUNK_HEIGHT && z < CHUNK_SIZE {
            self.blocks[block_index(x, y, z)]
        } else {
            Block::AIR
        }
    }

    /// Sets a block at local coordinates and keeps the height map current.
    ///
    /// Replacing a block drops any tile metadata attached to it.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, block: Block) {
        if x >= CHUNK_SIZE || y >= CHUNK_HEIGHT || z >= CHUNK_SIZE {
            return;
        }
        let index = block_index(x, y, z);
        if self.blocks[index] == block {
            return;
        }
        self.blocks[index] = block;
        self.tiles.remove(&index);
        self.modified = true;

        let column = column_index(x, z);
        let top = usize::from(self.height_map[column]);
        if !block.is_air() && y + 1 > top {
            self.height_map[column] = (y + 1) as u16;
        } else if block.is_air() && y + 1 == top {
            self.height_map[column] = (0..y)
                .rev()
                .find(|&below| !self.blocks[block_index(x, below, z)].is_air())
                .map_or(0, |below| (below + 1) as u16);
        }
    }

    /// Fills the layers `from_y..to_y` of every column with `block`.
    pub fn fill_layers(&mut self, from_y: usize, to_y: usize, block: Block) {
        for y in from_y..to_y.min(CHUNK_HEIGHT) {
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    self.set_block(x, y, z, block);
                }
            }
        }
    }

    /// One above the highest non-air block in a column, 0 if empty.
    #[inline]
    #[must_use]
    pub fn height(&self, x: usize, z: usize) -> u16 {
        if x < CHUNK_SIZE && z < CHUNK_SIZE {
            self.height_map[column_index(x, z)]
        } else {
            0
        }
    }

    /// Gets the saved biome id of a local column.
    #[inline]
    #[must_use]
    pub fn biome(&self, x: usize, z: usize) -> BiomeId {
        if x < CHUNK_SIZE && z < CHUNK_SIZE {
            self.biomes[column_index(x, z)]
        } else {
            BiomeId::default()
        }
    }

    /// Sets the saved biome id of a local column.
    #[inline]
    pub fn set_biome(&mut self, x: usize, z: usize, biome: BiomeId) {
        if x < CHUNK_SIZE && z < CHUNK_SIZE {
            self.biomes[column_index(x, z)] = biome;
        }
    }

    /// All saved biome ids, row-major `[z][x]`.
    #[inline]
    #[must_use]
    pub const fn biomes(&self) -> &[BiomeId; COLUMNS_PER_CHUNK] {
        &self.biomes
    }

    /// Overwrites the saved biome ids from a row-major 16x16 grid.
    ///
    /// Grids of the wrong size are ignored.
    pub fn fill_biomes(&mut self, biomes: &[BiomeId]) {
        debug_assert_eq!(biomes.len(), COLUMNS_PER_CHUNK);
        if biomes.len() == COLUMNS_PER_CHUNK {
            self.biomes.copy_from_slice(biomes);
            self.modified = true;
        }
    }

    /// Light level at local coordinates.
    #[inline]
    #[must_use]
    pub fn light(&self, x: usize, y: usize, z: usize) -> u8 {
        if x < CHUNK_SIZE && y < CHUNK_HEIGHT && z < CHUNK_SIZE {
            self.light[block_index(x, y, z)]
        } else {
            0
        }
    }

    /// Sets the light level at local coordinates, clamped to [`MAX_LIGHT`].
    pub fn set_light(&mut self, x: usize, y: usize, z: usize, level: u8) {
        if x < CHUNK_SIZE && y < CHUNK_HEIGHT && z < CHUNK_SIZE {
            self.light[block_index(x, y, z)] = level.min(MAX_LIGHT);
        }
    }

    /// Recomputes sky light for every column.
    ///
    /// Full light above the surface; liquids dim it by one per block and the
    /// first solid block stops it.
    pub fn generate_sky_light(&mut self) {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let mut level = MAX_LIGHT;
                for y in (0..CHUNK_HEIGHT).rev() {
                    let block = self.blocks[block_index(x, y, z)];
                    match block.material() {
                        Material::Solid => level = 0,
                        Material::Liquid => level = level.saturating_sub(1),
                        Material::Air | Material::Decoration => {}
                    }
                    self.light[block_index(x, y, z)] = level;
                }
            }
        }
    }

    /// Tile metadata at local coordinates.
    #[must_use]
    pub fn tile(&self, x: usize, y: usize, z: usize) -> Option<&toml::Table> {
        if x < CHUNK_SIZE && y < CHUNK_HEIGHT && z < CHUNK_SIZE {
            self.tiles.get(&block_index(x, y, z))
        } else {
            None
        }
    }

    /// Attaches tile metadata at local coordinates.
    pub fn set_tile(&mut self, x: usize, y: usize, z: usize, tag: toml::Table) {
        if x < CHUNK_SIZE && y < CHUNK_HEIGHT && z < CHUNK_SIZE {
            self.tiles.insert(block_index(x, y, z), tag);
            self.modified = true;
        }
    }

    /// Number of blocks carrying tile metadata.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

/// Host-side chunk storage.
///
/// A population pass moves its four chunks out with
/// [`checkout`](Self::checkout) and hands them back with
/// [`restore`](Self::restore), so nothing else can touch them in between.
pub trait ChunkStore {
    /// Moves a chunk out of the store, loading or creating it as needed.
    ///
    /// Returns `None` if the chunk cannot be provided.
    fn checkout(&mut self, coord: ChunkCoord) -> Option<Chunk>;

    /// Returns a checked-out chunk to the store.
    fn restore(&mut self, chunk: Chunk);

    /// A chunk that is already loaded, without loading it.
    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk>;

    /// Mutable access to a chunk that is already loaded.
    fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk>;
}

/// In-memory [`ChunkStore`]. Checking out a missing chunk creates an empty
/// one.
#[derive(Debug, Default)]
pub struct MemoryChunkStore {
    chunks: HashMap<ChunkCoord, Chunk>,
}

impl MemoryChunkStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a chunk.
    pub fn insert(&mut self, chunk: Chunk) {
        self.chunks.insert(chunk.coord(), chunk);
    }

    /// Removes a chunk.
    pub fn remove(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.remove(&coord)
    }

    /// Returns true if the chunk is loaded.
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if no chunk is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn checkout(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        Some(
            self.chunks
                .remove(&coord)
                .unwrap_or_else(|| Chunk::new(coord)),
        )
    }

    fn restore(&mut self, chunk: Chunk) {
        self.insert(chunk);
    }

    fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_coord_from_block() {
        assert_eq!(ChunkCoord::from_block_pos(0, 0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(15, 15), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(16, 16), ChunkCoord::new(1, 1));
        assert_eq!(ChunkCoord::from_block_pos(-1, -1), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-16, -16), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-17, -17), ChunkCoord::new(-2, -2));
        assert_eq!(ChunkCoord::new(-2, 3).world_x(), -32);
        assert_eq!(ChunkCoord::new(-2, 3).offset(1, 1), ChunkCoord::new(-1, 4));
    }

    #[test]
    fn test_chunk_coord_wraps_at_edges() {
        let edge = ChunkCoord::new(i32::MAX, i32::MIN);
        assert_eq!(edge.offset(1, -1), ChunkCoord::new(i32::MIN, i32::MAX));
        assert_eq!(edge.world_x(), i32::MAX.wrapping_mul(16));
        assert_eq!(edge.world_z(), 0);

        // Block coordinates map back to the chunk that holds them.
        let far = ChunkCoord::new(i32::MAX >> 4, i32::MIN >> 4);
        assert_eq!(ChunkCoord::from_block_pos(far.world_x(), far.world_z()), far);
        assert_eq!(ChunkCoord::from_block_pos(i32::MAX, i32::MIN), far);
    }

    #[test]
    fn test_material_classes() {
        assert_eq!(Block::AIR.material(), Material::Air);
        assert_eq!(Block::WATER.material(), Material::Liquid);
        assert_eq!(Block::new(8).material(), Material::Liquid);
        assert_eq!(Block::LAVA.material(), Material::Liquid);
        assert_eq!(Block::TALL_GRASS.material(), Material::Decoration);
        assert_eq!(Block::STONE.material(), Material::Solid);
        assert!(Block::SAND.is_solid());
        assert!(!Block::TALL_GRASS.is_solid());
    }

    #[test]
    fn test_height_map_tracks_writes() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert_eq!(chunk.height(3, 4), 0);

        chunk.set_block(3, 10, 4, Block::STONE);
        assert_eq!(chunk.height(3, 4), 11);
        chunk.set_block(3, 40, 4, Block::DIRT);
        assert_eq!(chunk.height(3, 4), 41);

        chunk.set_block(3, 40, 4, Block::AIR);
        assert_eq!(chunk.height(3, 4), 11);
        chunk.set_block(3, 10, 4, Block::AIR);
        assert_eq!(chunk.height(3, 4), 0);
        assert!(chunk.modified);
    }

    #[test]
    fn test_out_of_range_access() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.set_block(16, 0, 0, Block::STONE);
        chunk.set_block(0, 256, 0, Block::STONE);
        assert!(!chunk.modified);
        assert_eq!(chunk.block(0, 300, 0), Block::AIR);
        assert_eq!(chunk.light(99, 0, 0), 0);
    }

    #[test]
    fn test_sky_light() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.fill_layers(0, 60, Block::STONE);
        chunk.fill_layers(60, 64, Block::WATER);
        chunk.generate_sky_light();

        assert_eq!(chunk.light(5, 100, 5), MAX_LIGHT);
        assert_eq!(chunk.light(5, 63, 5), MAX_LIGHT - 1);
        assert_eq!(chunk.light(5, 60, 5), MAX_LIGHT - 4);
        assert_eq!(chunk.light(5, 59, 5), 0);
    }

    #[test]
    fn test_tiles_follow_blocks() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.set_block(1, 2, 3, Block::new(54));
        let mut tag = toml::Table::new();
        tag.insert("id".to_string(), toml::Value::String("Chest".to_string()));
        chunk.set_tile(1, 2, 3, tag.clone());
        assert_eq!(chunk.tile(1, 2, 3), Some(&tag));

        chunk.set_block(1, 2, 3, Block::AIR);
        assert!(chunk.tile(1, 2, 3).is_none());
        assert_eq!(chunk.tile_count(), 0);
    }

    #[test]
    fn test_memory_store_checkout_restore() {
        let mut store = MemoryChunkStore::new();
        let coord = ChunkCoord::new(4, -2);
        assert!(store.chunk(coord).is_none());

        let mut chunk = store.checkout(coord).unwrap();
        assert!(!store.contains(coord));
        chunk.set_block(0, 0, 0, Block::BEDROCK);
        store.restore(chunk);

        assert_eq!(store.len(), 1);
        assert_eq!(store.chunk(coord).unwrap().block(0, 0, 0), Block::BEDROCK);
    }
}

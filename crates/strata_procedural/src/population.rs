//! # Population Window
//!
//! Decorating a chunk (ores, plants, structures) touches its neighbours.
//! Population therefore works on a 2x2 chunk window anchored at the
//! populated chunk:
//!
//! ```text
//!        x →
//!   z  ┌────────┬────────┐
//!   ↓  │ [0]    │ [1]    │   [0] top-left (the populated chunk)
//!      │   ▓▓▓▓ │ ▓▓▓▓   │   [1] +x
//!      ├────────┼────────┤   [2] +z
//!      │   ▓▓▓▓ │ ▓▓▓▓   │   [3] +x +z
//!      │ [2]    │ [3]    │
//!      └────────┴────────┘   ▓ = area swept for block replacement
//! ```
//!
//! While a pass runs the four chunks are moved out of the [`ChunkStore`]
//! into the window, so the window is the only way to reach them. Block
//! access is expressed in world coordinates and resolved through the
//! window.
//!
//! ## Bounds Modes
//!
//! - [`BoundsMode::Strict`]: misuse of start/end is an error and access
//!   outside the window finds nothing.
//! - [`BoundsMode::Lenient`]: misuse is logged and worked around; access
//!   outside the window falls through to already loaded chunks.

use crate::biome::BiomeConfig;
use crate::chunk::{
    Block, Chunk, ChunkCoord, ChunkStore, Material, CHUNK_HEIGHT, CHUNK_SIZE, WORLD_DEPTH,
    WORLD_HEIGHT,
};
use crate::error::{GenError, GenResult};
use crate::generator::BiomeGridGenerator;
use crate::layer::Rect;

/// Columns per quadrant edge.
const QUADRANT: usize = CHUNK_SIZE / 2;

/// Highest-block search climbs at most this far above the height map.
const MAX_CLIMB: i32 = 5;

/// Sweep origin inside each window chunk, by cache index.
const QUADRANT_OFFSETS: [(usize, usize); 4] = [
    (QUADRANT, QUADRANT),
    (0, QUADRANT),
    (QUADRANT, 0),
    (0, 0),
];

/// How strictly the window enforces its bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundsMode {
    /// Misuse fails; outside access finds nothing.
    #[default]
    Strict,
    /// Misuse is logged; outside access falls back to the store.
    Lenient,
}

impl BoundsMode {
    /// Mode for a `population_bounds_check` setting.
    #[must_use]
    pub const fn from_bounds_check(check: bool) -> Self {
        if check {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Where the replacement sweep reads biomes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BiomeSource {
    /// Recompute with the layer chain.
    #[default]
    Generated,
    /// Use the biome ids saved in each chunk.
    Saved,
}

#[derive(Debug)]
enum WindowState {
    Idle,
    Populating {
        top_left: ChunkCoord,
        chunks: Box<[Chunk; 4]>,
    },
}

/// Index of `coord` inside a window anchored at `top_left`.
#[inline]
fn window_index(top_left: ChunkCoord, coord: ChunkCoord) -> Option<usize> {
    let ix = coord.x.wrapping_sub(top_left.x);
    let iz = coord.z.wrapping_sub(top_left.z);
    if (ix == 0 || ix == 1) && (iz == 0 || iz == 1) {
        Some((ix | (iz << 1)) as usize)
    } else {
        None
    }
}

/// Chunk coordinate of window slot `index`.
#[inline]
const fn window_coord(top_left: ChunkCoord, index: usize) -> ChunkCoord {
    top_left.offset((index & 1) as i32, (index >> 1) as i32)
}

#[inline]
const fn local(block: i32) -> usize {
    (block & 0xF) as usize
}

#[inline]
const fn y_in_world(y: i32) -> bool {
    y >= WORLD_DEPTH && y < WORLD_HEIGHT
}

/// Moves the four chunks of the window at `top_left` out of `store`.
fn checkout_four<S: ChunkStore + ?Sized>(
    store: &mut S,
    top_left: ChunkCoord,
) -> GenResult<Box<[Chunk; 4]>> {
    let mut taken: Vec<Chunk> = Vec::with_capacity(4);
    for index in 0..4 {
        let coord = window_coord(top_left, index);
        match store.checkout(coord) {
            Some(chunk) => taken.push(chunk),
            None => {
                for chunk in taken {
                    store.restore(chunk);
                }
                return Err(GenError::ChunkUnavailable {
                    x: coord.x,
                    z: coord.z,
                });
            }
        }
    }
    let chunks: Box<[Chunk]> = taken.into_boxed_slice();
    match chunks.try_into() {
        Ok(chunks) => Ok(chunks),
        Err(_) => unreachable!("exactly four chunks checked out"),
    }
}

fn restore_four<S: ChunkStore + ?Sized>(store: &mut S, chunks: Box<[Chunk; 4]>) {
    for chunk in *chunks {
        store.restore(chunk);
    }
}

/// The 2x2 chunk working set of a population pass.
#[derive(Debug)]
pub struct PopulationWindow {
    state: WindowState,
    bounds: BoundsMode,
}

impl Default for PopulationWindow {
    fn default() -> Self {
        Self::new(BoundsMode::default())
    }
}

impl PopulationWindow {
    /// Creates an idle window.
    #[must_use]
    pub const fn new(bounds: BoundsMode) -> Self {
        Self {
            state: WindowState::Idle,
            bounds,
        }
    }

    /// The configured bounds mode.
    #[inline]
    #[must_use]
    pub const fn bounds_mode(&self) -> BoundsMode {
        self.bounds
    }

    /// Returns true while a pass is running.
    #[inline]
    #[must_use]
    pub const fn is_populating(&self) -> bool {
        matches!(self.state, WindowState::Populating { .. })
    }

    /// Top-left chunk of the running pass.
    #[must_use]
    pub const fn top_left(&self) -> Option<ChunkCoord> {
        match &self.state {
            WindowState::Idle => None,
            WindowState::Populating { top_left, .. } => Some(*top_left),
        }
    }

    /// Starts a pass: checks the four chunks at `top_left` out of `store`.
    ///
    /// # Errors
    ///
    /// - [`GenError::InvalidState`] if a pass is already running (strict).
    /// - [`GenError::ChunkUnavailable`] if the store cannot provide a chunk;
    ///   the window is left idle.
    pub fn start<S: ChunkStore + ?Sized>(
        &mut self,
        store: &mut S,
        top_left: ChunkCoord,
    ) -> GenResult<()> {
        if let WindowState::Populating { top_left: old, .. } = &self.state {
            if self.bounds == BoundsMode::Strict {
                return Err(GenError::InvalidState(format!(
                    "chunk ({}, {}) is already being populated",
                    old.x, old.z
                )));
            }
            tracing::warn!(
                old_x = old.x,
                old_z = old.z,
                new_x = top_left.x,
                new_z = top_left.z,
                "population started while another pass is running"
            );
            self.release(store);
        }

        let chunks = checkout_four(store, top_left)?;
        tracing::debug!(x = top_left.x, z = top_left.z, "population started");
        self.state = WindowState::Populating { top_left, chunks };
        Ok(())
    }

    /// Ends the pass and returns the chunks to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidState`] if no pass is running (strict).
    pub fn end<S: ChunkStore + ?Sized>(&mut self, store: &mut S) -> GenResult<()> {
        match self.top_left() {
            Some(top_left) => {
                self.release(store);
                tracing::debug!(x = top_left.x, z = top_left.z, "population ended");
                Ok(())
            }
            None if self.bounds == BoundsMode::Strict => Err(GenError::InvalidState(
                "no chunk is being populated".to_string(),
            )),
            None => Ok(()),
        }
    }

    fn release<S: ChunkStore + ?Sized>(&mut self, store: &mut S) {
        if let WindowState::Populating { chunks, .. } =
            std::mem::replace(&mut self.state, WindowState::Idle)
        {
            restore_four(store, chunks);
        }
    }

    fn resolve<'a, S: ChunkStore + ?Sized>(
        &'a self,
        store: &'a S,
        x: i32,
        y: i32,
        z: i32,
    ) -> Option<&'a Chunk> {
        if !y_in_world(y) {
            return None;
        }
        let coord = ChunkCoord::from_block_pos(x, z);
        match &self.state {
            WindowState::Idle => store.chunk(coord),
            WindowState::Populating { top_left, chunks } => match window_index(*top_left, coord) {
                Some(index) => Some(&chunks[index]),
                None if self.bounds == BoundsMode::Strict => None,
                None => store.chunk(coord),
            },
        }
    }

    fn resolve_mut<'a, S: ChunkStore + ?Sized>(
        &'a mut self,
        store: &'a mut S,
        x: i32,
        y: i32,
        z: i32,
    ) -> Option<&'a mut Chunk> {
        if !y_in_world(y) {
            return None;
        }
        let coord = ChunkCoord::from_block_pos(x, z);
        match &mut self.state {
            WindowState::Idle => store.chunk_mut(coord),
            WindowState::Populating { top_left, chunks } => match window_index(*top_left, coord) {
                Some(index) => Some(&mut chunks[index]),
                None if self.bounds == BoundsMode::Strict => None,
                None => store.chunk_mut(coord),
            },
        }
    }

    /// Block at a world position, if loaded for the caller.
    #[must_use]
    pub fn block<S: ChunkStore + ?Sized>(&self, store: &S, x: i32, y: i32, z: i32) -> Option<Block> {
        self.resolve(store, x, y, z)
            .map(|chunk| chunk.block(local(x), y as usize, local(z)))
    }

    /// Material at a world position; unloaded positions read as air.
    #[must_use]
    pub fn material<S: ChunkStore + ?Sized>(&self, store: &S, x: i32, y: i32, z: i32) -> Material {
        self.block(store, x, y, z)
            .map_or(Material::Air, Block::material)
    }

    /// Returns true for air or unloaded positions.
    #[must_use]
    pub fn is_empty<S: ChunkStore + ?Sized>(&self, store: &S, x: i32, y: i32, z: i32) -> bool {
        self.material(store, x, y, z) == Material::Air
    }

    /// Returns true if the position is loaded for the caller.
    #[must_use]
    pub fn is_loaded<S: ChunkStore + ?Sized>(&self, store: &S, x: i32, y: i32, z: i32) -> bool {
        self.resolve(store, x, y, z).is_some()
    }

    /// Light level at a world position.
    #[must_use]
    pub fn light_level<S: ChunkStore + ?Sized>(
        &self,
        store: &S,
        x: i32,
        y: i32,
        z: i32,
    ) -> Option<u8> {
        self.resolve(store, x, y, z)
            .map(|chunk| chunk.light(local(x), y as usize, local(z)))
    }

    /// Writes a block at a world position.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::OutOfBounds`] if the position is not loaded for
    /// the caller.
    pub fn set_block<S: ChunkStore + ?Sized>(
        &mut self,
        store: &mut S,
        x: i32,
        y: i32,
        z: i32,
        block: Block,
    ) -> GenResult<()> {
        let chunk = self
            .resolve_mut(store, x, y, z)
            .ok_or(GenError::OutOfBounds { x, y, z })?;
        chunk.set_block(local(x), y as usize, local(z), block);
        Ok(())
    }

    /// Y of the first air block at or just above the column's surface.
    ///
    /// Starts at the height map and climbs through at most a few non-air
    /// blocks. `None` if the column is not loaded.
    #[must_use]
    pub fn highest_block_y<S: ChunkStore + ?Sized>(&self, store: &S, x: i32, z: i32) -> Option<i32> {
        let chunk = self.resolve(store, x, 0, z)?;
        let (lx, lz) = (local(x), local(z));
        let mut y = i32::from(chunk.height(lx, lz));
        let max_y = y + MAX_CLIMB;
        while y <= max_y && !chunk.block(lx, y as usize, lz).is_air() {
            y += 1;
        }
        Some(y)
    }

    /// One above the highest solid block below the surface.
    #[must_use]
    pub fn solid_height<S: ChunkStore + ?Sized>(&self, store: &S, x: i32, z: i32) -> Option<i32> {
        let top = self.highest_block_y(store, x, z)?;
        (1..top)
            .rev()
            .find(|&y| self.material(store, x, y, z) == Material::Solid)
            .map(|y| y + 1)
    }

    /// One above the highest liquid block below the surface.
    ///
    /// `None` if a solid block is reached first.
    #[must_use]
    pub fn liquid_height<S: ChunkStore + ?Sized>(&self, store: &S, x: i32, z: i32) -> Option<i32> {
        let top = self.highest_block_y(store, x, z)?;
        for y in (1..top).rev() {
            match self.material(store, x, y, z) {
                Material::Liquid => return Some(y + 1),
                Material::Solid => return None,
                Material::Air | Material::Decoration => {}
            }
        }
        None
    }

    /// Attaches tile metadata to the block at a world position.
    ///
    /// The position is written into the tag as `x`, `y`, `z`. Air carries
    /// no metadata; attaching to it is skipped and reported as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::OutOfBounds`] if the position is not loaded.
    pub fn attach_metadata<S: ChunkStore + ?Sized>(
        &mut self,
        store: &mut S,
        x: i32,
        y: i32,
        z: i32,
        mut tag: toml::Table,
    ) -> GenResult<bool> {
        let chunk = self
            .resolve_mut(store, x, y, z)
            .ok_or(GenError::OutOfBounds { x, y, z })?;
        let (lx, ly, lz) = (local(x), y as usize, local(z));
        if chunk.block(lx, ly, lz).is_air() {
            tracing::debug!(x, y, z, "skipping metadata for air block");
            return Ok(false);
        }
        tag.insert("x".to_string(), toml::Value::Integer(i64::from(x)));
        tag.insert("y".to_string(), toml::Value::Integer(i64::from(y)));
        tag.insert("z".to_string(), toml::Value::Integer(i64::from(z)));
        chunk.set_tile(lx, ly, lz, tag);
        Ok(true)
    }

    /// Tile metadata at a world position, without the position keys.
    #[must_use]
    pub fn metadata<S: ChunkStore + ?Sized>(
        &self,
        store: &S,
        x: i32,
        y: i32,
        z: i32,
    ) -> Option<toml::Table> {
        let chunk = self.resolve(store, x, y, z)?;
        let mut tag = chunk.tile(local(x), y as usize, local(z))?.clone();
        for key in ["x", "y", "z"] {
            tag.remove(key);
        }
        Some(tag)
    }

    /// Runs the block-replacement sweep for the window at `top_left`.
    ///
    /// Sweeps the central 16x16 block area of the window: one 8x8 quadrant
    /// of each of the four chunks. Returns the number of replaced blocks.
    ///
    /// If the window is not running at `top_left`, strict mode fails and
    /// lenient mode sweeps a temporary window. Chunks shared with the
    /// running window are swept in place, the rest are borrowed from the
    /// store and handed back afterwards. The running window survives
    /// either way.
    ///
    /// # Errors
    ///
    /// - [`GenError::InvalidState`] for a window mismatch (strict).
    /// - [`GenError::BiomeNotFound`] if a column's biome is unregistered.
    /// - [`GenError::ResourceExhausted`] if no pool slot is free.
    /// - [`GenError::ChunkUnavailable`] if a temporary checkout fails.
    pub fn replace_blocks<S: ChunkStore + ?Sized>(
        &mut self,
        store: &mut S,
        generator: &BiomeGridGenerator,
        source: BiomeSource,
        top_left: ChunkCoord,
    ) -> GenResult<usize> {
        if !generator.registry().has_replace_settings() {
            return Ok(0);
        }

        if self.top_left() == Some(top_left) {
            if let WindowState::Populating { chunks, .. } = &mut self.state {
                return sweep(chunks, generator, source);
            }
        }

        if self.bounds == BoundsMode::Strict {
            return Err(GenError::InvalidState(format!(
                "replacement for chunk ({}, {}) outside its population pass",
                top_left.x, top_left.z
            )));
        }
        tracing::warn!(
            x = top_left.x,
            z = top_left.z,
            "replacing blocks with a temporary chunk window"
        );

        // Chunks the running window already holds are swept in place; only
        // the rest are borrowed from the store.
        let mut borrowed = self.borrow_missing(store, top_left)?;

        let mut swept = Ok(0);
        for (index, offset) in QUADRANT_OFFSETS.into_iter().enumerate() {
            let coord = window_coord(top_left, index);
            let chunk = match (&mut borrowed[index], &mut self.state) {
                (Some(chunk), _) => chunk,
                (None, WindowState::Populating { top_left: running, chunks }) => {
                    match window_index(*running, coord) {
                        Some(slot) => &mut chunks[slot],
                        None => continue,
                    }
                }
                (None, WindowState::Idle) => continue,
            };
            match sweep_quadrant(chunk, offset, generator, source) {
                Ok(replaced) => swept = swept.map(|total| total + replaced),
                Err(err) => {
                    swept = Err(err);
                    break;
                }
            }
        }

        for chunk in borrowed.into_iter().flatten() {
            store.restore(chunk);
        }
        swept
    }

    /// Checks out the chunks of the window at `top_left` that the running
    /// window does not hold. Nothing stays borrowed on failure.
    fn borrow_missing<S: ChunkStore + ?Sized>(
        &self,
        store: &mut S,
        top_left: ChunkCoord,
    ) -> GenResult<[Option<Chunk>; 4]> {
        let mut borrowed: [Option<Chunk>; 4] = Default::default();
        let mut missing = None;
        for (index, slot) in borrowed.iter_mut().enumerate() {
            let coord = window_coord(top_left, index);
            if self.slot_of(coord).is_some() {
                continue;
            }
            *slot = store.checkout(coord);
            if slot.is_none() {
                missing = Some(coord);
                break;
            }
        }
        match missing {
            Some(coord) => {
                for chunk in borrowed.into_iter().flatten() {
                    store.restore(chunk);
                }
                Err(GenError::ChunkUnavailable {
                    x: coord.x,
                    z: coord.z,
                })
            }
            None => Ok(borrowed),
        }
    }

    /// Slot of `coord` in the running window, if any.
    fn slot_of(&self, coord: ChunkCoord) -> Option<usize> {
        match &self.state {
            WindowState::Populating { top_left, .. } => window_index(*top_left, coord),
            WindowState::Idle => None,
        }
    }
}

/// Replaces blocks in the four sweep quadrants of `chunks`.
fn sweep(
    chunks: &mut [Chunk; 4],
    generator: &BiomeGridGenerator,
    source: BiomeSource,
) -> GenResult<usize> {
    let mut replaced = 0;
    for (chunk, offset) in chunks.iter_mut().zip(QUADRANT_OFFSETS) {
        replaced += sweep_quadrant(chunk, offset, generator, source)?;
    }
    tracing::trace!(replaced, "replacement sweep done");
    Ok(replaced)
}

/// Replaces blocks in the 8x8 quadrant of `chunk` starting at `(ox, oz)`.
fn sweep_quadrant(
    chunk: &mut Chunk,
    (ox, oz): (usize, usize),
    generator: &BiomeGridGenerator,
    source: BiomeSource,
) -> GenResult<usize> {
    let mut replaced = 0;
    let biomes = quadrant_biomes(chunk, ox, oz, generator, source)?;
    for (i, biome) in biomes.into_iter().enumerate() {
        if !biome.replace.has_replace_settings() {
            continue;
        }
        let x = ox + i % QUADRANT;
        let z = oz + i / QUADRANT;
        for y in 0..CHUNK_HEIGHT {
            let current = chunk.block(x, y, z);
            match biome.replace.lookup(current.id, y) {
                Some(to) if to.id != current.id => {
                    chunk.set_block(x, y, z, to);
                    replaced += 1;
                }
                _ => {}
            }
        }
    }
    Ok(replaced)
}

/// Biome of every column in one 8x8 quadrant, row-major.
fn quadrant_biomes<'g>(
    chunk: &Chunk,
    ox: usize,
    oz: usize,
    generator: &'g BiomeGridGenerator,
    source: BiomeSource,
) -> GenResult<Vec<&'g BiomeConfig>> {
    let registry = generator.registry();
    match source {
        BiomeSource::Generated => {
            let area = Rect::new(
                chunk.coord().world_x().wrapping_add(ox as i32),
                chunk.coord().world_z().wrapping_add(oz as i32),
                QUADRANT,
                QUADRANT,
            );
            generator
                .generation_ids(area)?
                .into_iter()
                .map(|id| registry.by_generation(id))
                .collect()
        }
        BiomeSource::Saved => (0..QUADRANT * QUADRANT)
            .map(|i| {
                let saved = chunk.biome(ox + i % QUADRANT, oz + i / QUADRANT);
                registry
                    .by_saved(saved)
                    .ok_or(GenError::BiomeNotFound {
                        generation_id: i32::from(saved.get()),
                    })
            })
            .collect(),
    }
}

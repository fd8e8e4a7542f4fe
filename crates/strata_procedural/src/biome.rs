//! # Biome Registry
//!
//! Every biome has two ids:
//!
//! - a *generation id* (0-1023), written by the layer chain, and
//! - a *saved id* (0-255), stored in chunks.
//!
//! Several generation ids may share one saved id; this is how variants
//! beyond the persisted range are written to disk. The registry resolves
//! either kind of id to its [`BiomeConfig`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::chunk::{Block, MAX_BLOCK_ID, WORLD_HEIGHT};
use crate::error::{GenError, GenResult};

/// Number of generation ids.
pub const MAX_GENERATION_IDS: usize = 1024;

/// Number of saved ids.
pub const MAX_SAVED_IDS: usize = 256;

/// A saved (persisted) biome id.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BiomeId(pub u8);

impl BiomeId {
    /// The raw id.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Generation id and saved id of one biome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BiomeIds {
    /// Id used by the layer chain.
    pub generation: u16,
    /// Id stored in chunks.
    pub saved: BiomeId,
}

impl BiomeIds {
    /// Ids for a biome that saves under its own generation id.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if `generation` does not fit a
    /// saved id.
    pub fn same(generation: u16) -> GenResult<Self> {
        let saved = u8::try_from(generation).map_err(|_| {
            GenError::InvalidConfig(format!(
                "generation id {generation} needs an explicit saved id"
            ))
        })?;
        Ok(Self {
            generation,
            saved: BiomeId(saved),
        })
    }

    /// Returns true if this biome saves under a different id.
    #[inline]
    #[must_use]
    pub fn is_virtual(self) -> bool {
        self.generation != u16::from(self.saved.0)
    }
}

/// One replacement rule: `from` becomes `to` for `min_height..=max_height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceRule {
    /// Source block id.
    pub from: u16,
    /// Replacement block.
    pub to: Block,
    /// Lowest affected y.
    #[serde(default)]
    pub min_height: i32,
    /// Highest affected y.
    #[serde(default = "default_max_height")]
    pub max_height: i32,
}

const fn default_max_height() -> i32 {
    WORLD_HEIGHT - 1
}

impl ReplaceRule {
    /// A rule over the full world height.
    #[must_use]
    pub const fn new(from: u16, to: Block) -> Self {
        Self {
            from,
            to,
            min_height: 0,
            max_height: WORLD_HEIGHT - 1,
        }
    }

    /// Restricts the rule to `min_height..=max_height`.
    #[must_use]
    pub const fn between(mut self, min_height: i32, max_height: i32) -> Self {
        self.min_height = min_height;
        self.max_height = max_height;
        self
    }
}

/// Compiled replacement lookup: `(source id, y) -> replacement`.
///
/// Later rules override earlier ones where their ranges overlap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaceTable {
    by_source: HashMap<u16, Box<[Option<Block>]>>,
}

impl ReplaceTable {
    /// Compiles rules into a table.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] for block ids outside the id range
    /// or empty height ranges.
    pub fn compile(rules: &[ReplaceRule]) -> GenResult<Self> {
        let mut by_source: HashMap<u16, Box<[Option<Block>]>> = HashMap::new();
        for rule in rules {
            if rule.from >= MAX_BLOCK_ID || rule.to.id >= MAX_BLOCK_ID {
                return Err(GenError::InvalidConfig(format!(
                    "replace rule {} -> {} uses a block id outside 0..{MAX_BLOCK_ID}",
                    rule.from, rule.to.id
                )));
            }
            let min = rule.min_height.max(0);
            let max = rule.max_height.min(WORLD_HEIGHT - 1);
            if min > max {
                return Err(GenError::InvalidConfig(format!(
                    "replace rule for block {} has empty height range {}..={}",
                    rule.from, rule.min_height, rule.max_height
                )));
            }

            let heights = by_source
                .entry(rule.from)
                .or_insert_with(|| vec![None; WORLD_HEIGHT as usize].into_boxed_slice());
            for slot in &mut heights[min as usize..=max as usize] {
                *slot = Some(rule.to);
            }
        }
        Ok(Self { by_source })
    }

    /// Replacement for block `id` at height `y`, if any.
    #[inline]
    #[must_use]
    pub fn lookup(&self, id: u16, y: usize) -> Option<Block> {
        self.by_source.get(&id)?.get(y).copied().flatten()
    }

    /// Returns true if the table replaces anything.
    #[inline]
    #[must_use]
    pub fn has_replace_settings(&self) -> bool {
        !self.by_source.is_empty()
    }
}

/// Configuration of one registered biome.
#[derive(Clone, Debug, PartialEq)]
pub struct BiomeConfig {
    /// Unique name.
    pub name: String,
    /// Generation and saved id.
    pub ids: BiomeIds,
    /// Lower terrain height hint.
    pub min_height: f32,
    /// Upper terrain height hint.
    pub max_height: f32,
    /// Compiled block replacements.
    pub replace: ReplaceTable,
}

impl BiomeConfig {
    /// A biome with default heights and no replacements.
    #[must_use]
    pub fn new(name: impl Into<String>, ids: BiomeIds) -> Self {
        Self {
            name: name.into(),
            ids,
            min_height: 0.1,
            max_height: 0.3,
            replace: ReplaceTable::default(),
        }
    }

    /// Sets the height hints.
    #[must_use]
    pub const fn with_heights(mut self, min_height: f32, max_height: f32) -> Self {
        self.min_height = min_height;
        self.max_height = max_height;
        self
    }

    /// Sets the replacement table.
    #[must_use]
    pub fn with_replace(mut self, replace: ReplaceTable) -> Self {
        self.replace = replace;
        self
    }
}

/// The built-in biomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DefaultBiome {
    /// Open ocean.
    Ocean = 0,
    /// Plains/grassland.
    Plains = 1,
    /// Arid desert.
    Desert = 2,
    /// High mountains.
    ExtremeHills = 3,
    /// Forest.
    Forest = 4,
    /// Snowy taiga forest.
    Taiga = 5,
    /// Swamp/wetland.
    Swampland = 6,
    /// River.
    River = 7,
    /// Frozen ocean.
    FrozenOcean = 10,
    /// Cold tundra.
    IcePlains = 12,
    /// Beach/coastline.
    Beach = 16,
    /// Dense jungle.
    Jungle = 21,
    /// Deep ocean.
    DeepOcean = 24,
    /// Savanna grassland.
    Savanna = 35,
    /// Badlands.
    Mesa = 37,
}

impl DefaultBiome {
    /// All built-in biomes in id order.
    pub const ALL: [Self; 15] = [
        Self::Ocean,
        Self::Plains,
        Self::Desert,
        Self::ExtremeHills,
        Self::Forest,
        Self::Taiga,
        Self::Swampland,
        Self::River,
        Self::FrozenOcean,
        Self::IcePlains,
        Self::Beach,
        Self::Jungle,
        Self::DeepOcean,
        Self::Savanna,
        Self::Mesa,
    ];

    /// Land biomes handed out by the default layer chain.
    pub const LAND: [Self; 10] = [
        Self::Plains,
        Self::Desert,
        Self::ExtremeHills,
        Self::Forest,
        Self::Taiga,
        Self::Swampland,
        Self::IcePlains,
        Self::Jungle,
        Self::Savanna,
        Self::Mesa,
    ];

    /// Generation id (also the saved id).
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ocean => "Ocean",
            Self::Plains => "Plains",
            Self::Desert => "Desert",
            Self::ExtremeHills => "Extreme Hills",
            Self::Forest => "Forest",
            Self::Taiga => "Taiga",
            Self::Swampland => "Swampland",
            Self::River => "River",
            Self::FrozenOcean => "FrozenOcean",
            Self::IcePlains => "Ice Plains",
            Self::Beach => "Beach",
            Self::Jungle => "Jungle",
            Self::DeepOcean => "Deep Ocean",
            Self::Savanna => "Savanna",
            Self::Mesa => "Mesa",
        }
    }

    /// Terrain height hints `(min, max)`.
    #[must_use]
    pub const fn heights(self) -> (f32, f32) {
        match self {
            Self::Ocean | Self::FrozenOcean => (-1.0, 0.1),
            Self::DeepOcean => (-1.8, 0.1),
            Self::River => (-0.5, 0.0),
            Self::Beach => (0.0, 0.025),
            Self::Swampland => (-0.2, 0.1),
            Self::ExtremeHills => (1.0, 0.5),
            Self::Taiga | Self::Forest | Self::Jungle | Self::Mesa => (0.1, 0.2),
            Self::Plains | Self::Desert | Self::IcePlains | Self::Savanna => (0.125, 0.05),
        }
    }

    /// Registry entry for this biome.
    #[must_use]
    pub fn config(self) -> BiomeConfig {
        let (min, max) = self.heights();
        BiomeConfig::new(
            self.name(),
            BiomeIds {
                generation: u16::from(self.id()),
                saved: BiomeId(self.id()),
            },
        )
        .with_heights(min, max)
    }
}

/// All registered biomes of a world.
#[derive(Clone, Debug)]
pub struct BiomeRegistry {
    biomes: Vec<BiomeConfig>,
    by_generation: Vec<Option<usize>>,
    by_saved: Vec<Option<usize>>,
    by_name: HashMap<String, usize>,
}

impl Default for BiomeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BiomeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            biomes: Vec::new(),
            by_generation: vec![None; MAX_GENERATION_IDS],
            by_saved: vec![None; MAX_SAVED_IDS],
            by_name: HashMap::new(),
        }
    }

    /// A registry holding every [`DefaultBiome`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for biome in DefaultBiome::ALL {
            let config = biome.config();
            let index = registry.biomes.len();
            registry.index(&config, index);
            registry.biomes.push(config);
        }
        registry
    }

    /// Registers a biome.
    ///
    /// A saved id resolves to the biome whose generation id equals it, or
    /// else to the first biome registered under it.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if the generation id is out of
    /// range or taken, or the name is taken.
    pub fn register(&mut self, config: BiomeConfig) -> GenResult<()> {
        let generation = usize::from(config.ids.generation);
        if generation >= MAX_GENERATION_IDS {
            return Err(GenError::InvalidConfig(format!(
                "biome '{}' has generation id {generation}, outside 0..{MAX_GENERATION_IDS}",
                config.name
            )));
        }
        if let Some(existing) = self.by_generation[generation] {
            return Err(GenError::InvalidConfig(format!(
                "biome '{}' reuses generation id {generation} of '{}'",
                config.name, self.biomes[existing].name
            )));
        }
        if self.by_name.contains_key(&config.name) {
            return Err(GenError::InvalidConfig(format!(
                "biome name '{}' registered twice",
                config.name
            )));
        }

        let index = self.biomes.len();
        self.index(&config, index);
        self.biomes.push(config);
        Ok(())
    }

    fn index(&mut self, config: &BiomeConfig, index: usize) {
        self.by_generation[usize::from(config.ids.generation)] = Some(index);
        let saved = &mut self.by_saved[usize::from(config.ids.saved.0)];
        if saved.is_none() || !config.ids.is_virtual() {
            *saved = Some(index);
        }
        self.by_name.insert(config.name.clone(), index);
    }

    /// Resolves a generation id.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::BiomeNotFound`] if nothing is registered for it.
    pub fn by_generation(&self, generation_id: i32) -> GenResult<&BiomeConfig> {
        usize::try_from(generation_id)
            .ok()
            .and_then(|id| self.by_generation.get(id).copied().flatten())
            .map(|index| &self.biomes[index])
            .ok_or(GenError::BiomeNotFound { generation_id })
    }

    /// Resolves a saved id.
    #[must_use]
    pub fn by_saved(&self, id: BiomeId) -> Option<&BiomeConfig> {
        self.by_saved[usize::from(id.0)].map(|index| &self.biomes[index])
    }

    /// Looks a biome up by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&BiomeConfig> {
        self.by_name.get(name).map(|&index| &self.biomes[index])
    }

    /// Saved id for a generation id, if registered.
    #[inline]
    #[must_use]
    pub fn saved_id(&self, generation_id: usize) -> Option<BiomeId> {
        self.by_generation
            .get(generation_id)
            .copied()
            .flatten()
            .map(|index| self.biomes[index].ids.saved)
    }

    /// Lowest generation id with nothing registered.
    #[must_use]
    pub fn free_generation_id(&self) -> Option<u16> {
        self.by_generation
            .iter()
            .position(Option::is_none)
            .map(|id| id as u16)
    }

    /// Returns true if any biome replaces blocks.
    #[must_use]
    pub fn has_replace_settings(&self) -> bool {
        self.biomes.iter().any(|b| b.replace.has_replace_settings())
    }

    /// Registered biomes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BiomeConfig> {
        self.biomes.iter()
    }

    /// Number of registered biomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.biomes.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.biomes.is_empty()
    }
}

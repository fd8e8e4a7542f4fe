//! # Biome Layer Pipeline
//!
//! A linear chain of seeded grid transforms. The bottom of the chain is a
//! source stage that invents ids from nothing; every stage above it asks its
//! child for a (usually smaller, padded) rectangle and transforms it into
//! the rectangle it was asked for.
//!
//! ```text
//!   request (x, z, w, h)
//!        │
//!   VoronoiZoom ──► child (x-2>>2, z-2>>2, w/4+3, h/4+3)
//!        │
//!      Zoom     ──► child (x>>1, z>>1, w/2+2, h/2+2)
//!        │
//!      Base     ──► ids from the seeded RNG
//! ```
//!
//! ## Rules
//!
//! - Stages are a closed set ([`Stage`]); there is no open extension point.
//! - A chain is built once and is immutable afterwards.
//! - All buffers come from the [`ArraysCache`] of the calling request.
//! - RNG state lives on the stack of a single call.

mod stages;
mod voronoi;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strata_core::{ArrayPool, ArraysCache};

use crate::biome::DefaultBiome;
use crate::error::{GenError, GenResult};
use crate::rng::{scramble_layer_seed, world_gen_seed, SeededRng};

pub use voronoi::nearest_corner;

/// A rectangle of grid cells in world (or child-layer) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Minimum x.
    pub x: i32,
    /// Minimum z.
    pub z: i32,
    /// Extent along x.
    pub width: usize,
    /// Extent along z.
    pub height: usize,
}

impl Rect {
    /// Creates a rectangle.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32, width: usize, height: usize) -> Self {
        Self {
            x,
            z,
            width,
            height,
        }
    }

    /// Number of cells.
    #[inline]
    #[must_use]
    pub const fn area(self) -> usize {
        self.width * self.height
    }

    /// Returns true if the rectangle has no cells.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns true if the cell `(x, z)` lies inside the rectangle.
    #[must_use]
    pub fn contains(self, x: i32, z: i32) -> bool {
        let dx = i64::from(x) - i64::from(self.x);
        let dz = i64::from(z) - i64::from(self.z);
        dx >= 0 && dz >= 0 && (dx as u64) < self.width as u64 && (dz as u64) < self.height as u64
    }
}

/// One kind of pipeline stage.
///
/// Ids are generation ids. Source stages (`Island`, `Base`) must sit at the
/// bottom of a chain; every other stage needs a child.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    /// Source: one cell in ten is `land`, the rest `ocean`. The world
    /// origin is always land.
    Island {
        /// Id used for land cells.
        land: i32,
        /// Id used for ocean cells.
        ocean: i32,
    },
    /// Source: uniform pick from `biomes` per cell.
    Base {
        /// Candidate ids.
        biomes: Vec<i32>,
    },
    /// Doubles resolution; copies the top-left cell of each quad and
    /// perturbs the other three.
    Zoom,
    /// Grows and erodes coastlines using diagonal neighbours.
    AddIsland {
        /// Id treated as ocean.
        ocean: i32,
    },
    /// Replaces every non-ocean cell with a random pick from `biomes`.
    AssignBiomes {
        /// Id treated as ocean.
        ocean: i32,
        /// Candidate ids for land cells.
        biomes: Vec<i32>,
    },
    /// Majority vote over the four direct neighbours.
    Smooth,
    /// Land cells touching ocean become `shore`.
    Shore {
        /// Id treated as ocean.
        ocean: i32,
        /// Id written on the coast.
        shore: i32,
    },
    /// Quadruples resolution with jittered Voronoi cells.
    VoronoiZoom,
}

impl Stage {
    /// Returns true for stages that take no child.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Island { .. } | Self::Base { .. })
    }

    /// Rectangle this stage requests from its child to produce `area`.
    ///
    /// `None` for source stages.
    #[must_use]
    pub fn child_rect(&self, area: Rect) -> Option<Rect> {
        match self {
            Self::Island { .. } | Self::Base { .. } => None,
            Self::Zoom => Some(stages::zoom_child_rect(area)),
            Self::AssignBiomes { .. } => Some(area),
            Self::AddIsland { .. } | Self::Smooth | Self::Shore { .. } => {
                Some(stages::padded_child_rect(area))
            }
            Self::VoronoiZoom => Some(voronoi::child_rect(area)),
        }
    }

    /// Ids this stage can write that did not come from its child.
    #[must_use]
    pub fn introduced_ids(&self) -> Vec<i32> {
        match self {
            Self::Island { land, ocean } => vec![*land, *ocean],
            Self::Base { biomes } => biomes.clone(),
            Self::AddIsland { ocean } => vec![*ocean],
            Self::AssignBiomes { ocean, biomes } => {
                let mut ids = biomes.clone();
                ids.push(*ocean);
                ids
            }
            Self::Shore { shore, .. } => vec![*shore],
            Self::Zoom | Self::Smooth | Self::VoronoiZoom => Vec::new(),
        }
    }

    fn validate(&self) -> GenResult<()> {
        match self {
            Self::Base { biomes } | Self::AssignBiomes { biomes, .. } if biomes.is_empty() => Err(
                GenError::InvalidConfig("stage needs at least one candidate biome".to_string()),
            ),
            _ => match self.introduced_ids().into_iter().find(|id| *id < 0) {
                Some(id) => Err(GenError::InvalidConfig(format!(
                    "negative generation id {id} in layer stage"
                ))),
                None => Ok(()),
            },
        }
    }
}

/// Configured layer: stage plus its layer seed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    /// Layer-local seed, mixed with the world seed.
    pub seed: i64,
    /// The transform.
    pub stage: Stage,
}

impl LayerSpec {
    /// Creates a spec.
    #[must_use]
    pub const fn new(seed: i64, stage: Stage) -> Self {
        Self { seed, stage }
    }
}

/// The built-in overworld chain, bottom first.
///
/// Islands are grown over several zooms, assigned land biomes, smoothed,
/// given beaches and finally refined to block resolution.
#[must_use]
pub fn overworld_layers() -> Vec<LayerSpec> {
    let ocean = i32::from(DefaultBiome::Ocean.id());
    let land = i32::from(DefaultBiome::Plains.id());
    let biomes = DefaultBiome::LAND.iter().map(|b| i32::from(b.id())).collect();

    vec![
        LayerSpec::new(1, Stage::Island { land, ocean }),
        LayerSpec::new(2000, Stage::Zoom),
        LayerSpec::new(1, Stage::AddIsland { ocean }),
        LayerSpec::new(2001, Stage::Zoom),
        LayerSpec::new(2, Stage::AddIsland { ocean }),
        LayerSpec::new(200, Stage::AssignBiomes { ocean, biomes }),
        LayerSpec::new(1000, Stage::Zoom),
        LayerSpec::new(1001, Stage::Zoom),
        LayerSpec::new(1000, Stage::Smooth),
        LayerSpec::new(1002, Stage::Zoom),
        LayerSpec::new(
            1000,
            Stage::Shore {
                ocean,
                shore: i32::from(DefaultBiome::Beach.id()),
            },
        ),
        LayerSpec::new(1003, Stage::Zoom),
        LayerSpec::new(1001, Stage::Smooth),
        LayerSpec::new(10, Stage::VoronoiZoom),
    ]
}

/// One built stage of a chain.
#[derive(Debug)]
pub struct Layer {
    stage: Stage,
    layer_seed: i64,
    world_gen_seed: i64,
    child: Option<Box<Layer>>,
}

impl Layer {
    /// The stage kind.
    #[inline]
    #[must_use]
    pub const fn stage(&self) -> &Stage {
        &self.stage
    }

    /// The configured (unscrambled) layer seed.
    #[inline]
    #[must_use]
    pub const fn layer_seed(&self) -> i64 {
        self.layer_seed
    }

    /// The child layer, if any.
    #[must_use]
    pub fn child(&self) -> Option<&Layer> {
        self.child.as_deref()
    }

    /// Computes the grid for `area`, row-major, `area.width * area.height`
    /// cells long.
    ///
    /// The returned buffer was drawn from `cache`; give it back with
    /// [`ArraysCache::recycle`] once done.
    pub fn get_grid(&self, cache: &mut ArraysCache, area: Rect) -> Vec<i32> {
        if area.is_empty() {
            return cache.take(0);
        }

        let mut rng = SeededRng::new(self.world_gen_seed);
        match &self.stage {
            Stage::Island { land, ocean } => stages::island(&mut rng, cache, area, *land, *ocean),
            Stage::Base { biomes } => stages::base(&mut rng, cache, area, biomes),
            stage => {
                let child_area = stage.child_rect(area).unwrap_or(area);
                let child = self.input().get_grid(cache, child_area);
                let out = match stage {
                    Stage::Zoom => stages::zoom(&mut rng, cache, &child, child_area, area),
                    Stage::AddIsland { ocean } => {
                        stages::add_island(&mut rng, cache, &child, area, *ocean)
                    }
                    Stage::AssignBiomes { ocean, biomes } => {
                        stages::assign_biomes(&mut rng, cache, &child, area, *ocean, biomes)
                    }
                    Stage::Smooth => stages::smooth(&mut rng, cache, &child, area),
                    Stage::Shore { ocean, shore } => {
                        stages::shore(cache, &child, area, *ocean, *shore)
                    }
                    Stage::VoronoiZoom => {
                        voronoi::zoom_voronoi(&mut rng, cache, &child, child_area, area)
                    }
                    Stage::Island { .. } | Stage::Base { .. } => unreachable!(),
                };
                cache.recycle(child);
                out
            }
        }
    }

    fn input(&self) -> &Layer {
        // LayerStackBuilder only gives transform stages a child.
        match self.child.as_deref() {
            Some(child) => child,
            None => unreachable!("transform stage {:?} built without a child", self.stage),
        }
    }
}

/// A complete, immutable layer chain.
///
/// # Example
///
/// ```rust
/// use strata_core::ArrayPool;
/// use strata_procedural::layer::{LayerStack, Rect, Stage};
///
/// let stack = LayerStack::builder(12345)
///     .source(1, Stage::Base { biomes: vec![1, 2, 3] })
///     .then(2000, Stage::Zoom)
///     .then(10, Stage::VoronoiZoom)
///     .build()
///     .unwrap();
///
/// let pool = ArrayPool::default();
/// let grid = stack.generate(&pool, Rect::new(0, 0, 16, 16)).unwrap();
/// assert_eq!(grid.len(), 256);
/// ```
#[derive(Debug)]
pub struct LayerStack {
    root: Layer,
    world_seed: i64,
    depth: usize,
}

impl LayerStack {
    /// Starts building a chain for `world_seed`.
    #[must_use]
    pub fn builder(world_seed: i64) -> LayerStackBuilder {
        LayerStackBuilder {
            world_seed,
            specs: Vec::new(),
        }
    }

    /// Builds a chain from configured specs, bottom (source) first.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if the chain is malformed.
    pub fn from_specs(world_seed: i64, specs: &[LayerSpec]) -> GenResult<Self> {
        LayerStackBuilder {
            world_seed,
            specs: specs.to_vec(),
        }
        .build()
    }

    /// The built-in overworld chain for `world_seed`.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in chain; the `Result` mirrors
    /// [`from_specs`](Self::from_specs).
    pub fn overworld(world_seed: i64) -> GenResult<Self> {
        Self::from_specs(world_seed, &overworld_layers())
    }

    /// The world seed the chain was built for.
    #[inline]
    #[must_use]
    pub const fn world_seed(&self) -> i64 {
        self.world_seed
    }

    /// The top of the chain.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> &Layer {
        &self.root
    }

    /// Number of layers in the chain.
    #[inline]
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Every id the chain can produce.
    #[must_use]
    pub fn emitted_ids(&self) -> BTreeSet<i32> {
        let mut ids = BTreeSet::new();
        let mut layer = Some(&self.root);
        while let Some(current) = layer {
            ids.extend(current.stage.introduced_ids());
            layer = current.child();
        }
        ids
    }

    /// Computes `area` with an already claimed cache.
    pub fn get_grid(&self, cache: &mut ArraysCache, area: Rect) -> Vec<i32> {
        self.root.get_grid(cache, area)
    }

    /// Claims a pool slot, computes `area`, and returns an owned copy.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::ResourceExhausted`] if the pool has no free slot.
    pub fn generate(&self, pool: &ArrayPool, area: Rect) -> GenResult<Vec<i32>> {
        let mut cache = pool.acquire()?;
        tracing::trace!(x = area.x, z = area.z, width = area.width, height = area.height, "layer grid");
        let grid = self.root.get_grid(&mut cache, area);
        let owned = grid.clone();
        cache.recycle(grid);
        Ok(owned)
    }
}

/// Builder for [`LayerStack`].
#[derive(Debug)]
#[must_use]
pub struct LayerStackBuilder {
    world_seed: i64,
    specs: Vec<LayerSpec>,
}

impl LayerStackBuilder {
    /// Sets the source stage at the bottom of the chain.
    pub fn source(mut self, seed: i64, stage: Stage) -> Self {
        self.specs.insert(0, LayerSpec::new(seed, stage));
        self
    }

    /// Stacks a stage on top of the chain built so far.
    pub fn then(mut self, seed: i64, stage: Stage) -> Self {
        self.specs.push(LayerSpec::new(seed, stage));
        self
    }

    /// Validates and builds the chain.
    ///
    /// # Errors
    ///
    /// Returns [`GenError::InvalidConfig`] if the chain is empty, does not
    /// start with exactly one source stage, or a stage has invalid ids.
    pub fn build(self) -> GenResult<LayerStack> {
        let Some((first, rest)) = self.specs.split_first() else {
            return Err(GenError::InvalidConfig("layer chain is empty".to_string()));
        };
        if !first.stage.is_source() {
            return Err(GenError::InvalidConfig(format!(
                "layer chain must start with a source stage, found {:?}",
                first.stage
            )));
        }
        if let Some(extra) = rest.iter().find(|spec| spec.stage.is_source()) {
            return Err(GenError::InvalidConfig(format!(
                "source stage {:?} can only be at the bottom of the chain",
                extra.stage
            )));
        }

        let mut child: Option<Box<Layer>> = None;
        for spec in &self.specs {
            spec.stage.validate()?;
            child = Some(Box::new(Layer {
                stage: spec.stage.clone(),
                layer_seed: spec.seed,
                world_gen_seed: world_gen_seed(self.world_seed, scramble_layer_seed(spec.seed)),
                child,
            }));
        }

        let root = match child {
            Some(root) => *root,
            None => unreachable!(),
        };
        Ok(LayerStack {
            root,
            world_seed: self.world_seed,
            depth: self.specs.len(),
        })
    }
}

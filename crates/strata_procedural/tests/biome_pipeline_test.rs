//! # Biome Pipeline Tests
//!
//! End-to-end checks of the layer chain through the public API: determinism,
//! window independence and the biome remap.

use std::sync::Arc;

use strata_core::ArrayPool;
use strata_procedural::{
    BiomeGridGenerator, BiomeId, BiomeRegistry, DefaultBiome, LayerStack, MemoryChunkStore, Rect,
    Stage, World, WorldConfig,
};

fn land_ids() -> Vec<i32> {
    DefaultBiome::LAND.iter().map(|b| i32::from(b.id())).collect()
}

/// Base -> Zoom x3 -> VoronoiZoom, the reference chain.
fn reference_generator(seed: i64) -> BiomeGridGenerator {
    let stack = LayerStack::builder(seed)
        .source(1, Stage::Base { biomes: land_ids() })
        .then(2000, Stage::Zoom)
        .then(2001, Stage::Zoom)
        .then(2002, Stage::Zoom)
        .then(10, Stage::VoronoiZoom)
        .build()
        .unwrap();
    BiomeGridGenerator::new(
        stack,
        Arc::new(BiomeRegistry::with_defaults()),
        Arc::new(ArrayPool::default()),
    )
    .unwrap()
}

/// Test: seed 12345 grids are reproducible and window independent.
#[test]
fn test_reference_chain_end_to_end() {
    let gen = reference_generator(12345);

    let first = gen.get_grid(Rect::new(0, 0, 16, 16)).unwrap();
    let again = reference_generator(12345)
        .get_grid(Rect::new(0, 0, 16, 16))
        .unwrap();
    assert_eq!(first, again);

    let large = gen.get_grid(Rect::new(0, 0, 32, 32)).unwrap();
    for z in 0..16 {
        for x in 0..16 {
            assert_eq!(first.get(x, z), large.get(x, z), "cell ({x}, {z})");
        }
    }

    let land: Vec<BiomeId> = DefaultBiome::LAND.iter().map(|b| BiomeId(b.id())).collect();
    assert!(large.cells().iter().all(|id| land.contains(id)));
}

/// Seven-biome base at layer seed 1 under a single refining stage.
fn two_stage_grid(layer_seed: i64, stage: Stage, area: Rect) -> Vec<i32> {
    LayerStack::builder(12345)
        .source(1, Stage::Base { biomes: (0..7).collect() })
        .then(layer_seed, stage)
        .build()
        .unwrap()
        .generate(&ArrayPool::default(), area)
        .unwrap()
}

/// Test: a zoomed grid is pinned cell for cell.
#[test]
fn test_zoom_reference_grid() {
    let grid = two_stage_grid(2000, Stage::Zoom, Rect::new(-5, 3, 13, 9));
    #[rustfmt::skip]
    let expected = [
        6, 6, 6, 5, 5, 6, 6, 0, 1, 1, 5, 2, 1,
        1, 1, 1, 3, 5, 5, 5, 2, 2, 5, 5, 5, 5,
        4, 1, 1, 3, 2, 5, 2, 2, 2, 2, 5, 5, 0,
        4, 4, 2, 2, 2, 2, 3, 3, 3, 2, 2, 1, 1,
        5, 4, 2, 2, 2, 2, 3, 0, 2, 2, 2, 1, 1,
        5, 5, 2, 2, 4, 4, 4, 0, 0, 2, 2, 2, 2,
        5, 5, 2, 2, 2, 0, 0, 6, 6, 2, 2, 2, 6,
        2, 2, 2, 2, 0, 0, 6, 6, 6, 3, 0, 0, 0,
        2, 2, 2, 6, 6, 4, 0, 6, 0, 5, 5, 6, 6,
    ];
    assert_eq!(grid, expected);
}

/// Test: a Voronoi-zoomed grid is pinned cell for cell.
#[test]
fn test_voronoi_reference_grid() {
    let grid = two_stage_grid(10, Stage::VoronoiZoom, Rect::new(-5, 3, 13, 9));
    #[rustfmt::skip]
    let expected = [
        2, 2, 2, 5, 5, 2, 2, 2, 2, 2, 2, 2, 2,
        6, 6, 5, 5, 5, 5, 2, 2, 6, 6, 2, 2, 2,
        6, 6, 5, 5, 5, 5, 5, 6, 6, 6, 6, 2, 2,
        6, 6, 5, 5, 5, 5, 5, 6, 6, 6, 6, 0, 0,
        6, 6, 6, 5, 5, 5, 6, 6, 6, 6, 6, 0, 0,
        6, 6, 6, 3, 5, 5, 5, 5, 5, 6, 0, 0, 0,
        1, 1, 3, 3, 3, 5, 5, 5, 5, 5, 0, 0, 2,
        1, 3, 3, 3, 3, 5, 5, 5, 5, 5, 2, 2, 2,
        1, 3, 3, 3, 3, 3, 5, 5, 5, 5, 2, 2, 2,
    ];
    assert_eq!(grid, expected);
}

/// Test: different seeds give different worlds.
#[test]
fn test_seeds_differ() {
    let area = Rect::new(-64, -64, 128, 128);
    let a = reference_generator(1).get_grid(area).unwrap();
    let b = reference_generator(2).get_grid(area).unwrap();
    assert_ne!(a, b);
}

/// Test: overlapping windows of the overworld chain agree cell by cell.
#[test]
fn test_overworld_windows_agree() {
    let world = World::new(&WorldConfig::with_seed(-4242), MemoryChunkStore::new()).unwrap();

    let big = world.get_grid(Rect::new(-100, 37, 120, 90)).unwrap();
    let windows = [
        Rect::new(-100, 37, 1, 1),
        Rect::new(-63, 50, 17, 9),
        Rect::new(0, 100, 20, 27),
        Rect::new(-2, 37, 3, 90),
    ];
    for area in windows {
        let part = world.get_grid(area).unwrap();
        for z in area.z..area.z + area.height as i32 {
            for x in area.x..area.x + area.width as i32 {
                assert_eq!(part.get(x, z), big.get(x, z), "cell ({x}, {z}) of {area:?}");
            }
        }
    }
}

/// Test: single-point queries agree with grids.
#[test]
fn test_biome_at_agrees_with_grid() {
    let world = World::new(&WorldConfig::with_seed(99), MemoryChunkStore::new()).unwrap();
    let grid = world.get_grid(Rect::new(500, -300, 40, 40)).unwrap();
    for (x, z) in [(500, -300), (539, -261), (517, -290), (520, -280)] {
        assert_eq!(Some(world.biome_at(x, z).unwrap()), grid.get(x, z));
    }
}

/// Test: the overworld produces oceans and more than one land biome.
#[test]
fn test_overworld_has_variety() {
    let world = World::new(&WorldConfig::with_seed(8), MemoryChunkStore::new()).unwrap();
    let grid = world.get_grid(Rect::new(-1024, -1024, 2048, 2048)).unwrap();

    let mut seen = std::collections::BTreeSet::new();
    for id in grid.cells() {
        seen.insert(id.get());
    }
    println!("Distinct biomes: {seen:?}");

    assert!(seen.contains(&DefaultBiome::Ocean.id()));
    assert!(seen.len() >= 3, "too few biomes: {seen:?}");
}

/// Test: a zero-sized request is valid and empty.
#[test]
fn test_empty_request() {
    let gen = reference_generator(5);
    assert!(gen.get_grid(Rect::new(10, 10, 0, 7)).unwrap().cells().is_empty());
}

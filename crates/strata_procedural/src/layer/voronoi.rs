//! # Voronoi Zoom
//!
//! Quadruples resolution. Each child cell contributes a jittered feature
//! point; every output cell takes the id of the nearest of the four points
//! around it, which turns blocky child cells into irregular organic borders.
//!
//! ## Layout
//!
//! ```text
//!  child quad (TL TR / BL BR) ──► 4x4 output block
//!
//!   TL ●───────● TR        point = corner * 4 + jitter
//!      │ ░░░▒▒ │           jitter ∈ [-1.8, 1.8) on each axis
//!      │ ░░▒▒▒ │
//!   BL ●───────● BR
//! ```
//!
//! The request is translated by `(-2, -2)` before the child rectangle is
//! derived, so feature points sit at cell centres in world space.

use strata_core::ArraysCache;

use super::stages::crop;
use super::Rect;
use crate::rng::SeededRng;

/// log2 of the zoom factor.
const SHIFT: u32 = 2;
/// Output cells per child cell along one axis.
const CELL: usize = 1 << SHIFT;
/// Total jitter span per axis.
const JITTER: f64 = CELL as f64 * 0.9;

/// Child rectangle for a Voronoi zoom of `area`.
pub(super) fn child_rect(area: Rect) -> Rect {
    let x = area.x.wrapping_sub(2);
    let z = area.z.wrapping_sub(2);
    Rect::new(
        x >> SHIFT,
        z >> SHIFT,
        (area.width >> SHIFT) + 3,
        (area.height >> SHIFT) + 3,
    )
}

/// Index of the strictly nearest point among `[TL, TR, BL, BR]`.
///
/// Points are compared in order; on an exact tie no earlier point wins, so
/// ties fall through to the bottom-right point.
///
/// ```rust
/// use strata_procedural::layer::nearest_corner;
///
/// assert_eq!(nearest_corner([1.0, 2.0, 3.0, 4.0]), 0);
/// assert_eq!(nearest_corner([1.0, 1.0, 3.0, 4.0]), 3);
/// ```
#[must_use]
pub fn nearest_corner(dist: [f64; 4]) -> usize {
    let [tl, tr, bl, br] = dist;
    if tl < tr && tl < bl && tl < br {
        0
    } else if tr < tl && tr < bl && tr < br {
        1
    } else if bl < tl && bl < tr && bl < br {
        2
    } else {
        3
    }
}

/// A jittered feature point in the 8x8 space spanned by one child quad.
#[derive(Clone, Copy, Debug)]
struct FeaturePoint {
    x: f64,
    z: f64,
}

impl FeaturePoint {
    fn jittered(rng: &mut SeededRng, cx: i32, cz: i32, base_x: f64, base_z: f64) -> Self {
        rng.init_chunk_seed(i64::from(cx << SHIFT), i64::from(cz << SHIFT));
        let x = (f64::from(rng.next_int(1024)) / 1024.0 - 0.5) * JITTER + base_x;
        let z = (f64::from(rng.next_int(1024)) / 1024.0 - 0.5) * JITTER + base_z;
        Self { x, z }
    }

    #[inline]
    fn distance_sq(self, col: usize, row: usize) -> f64 {
        let dz = row as f64 - self.z;
        let dx = col as f64 - self.x;
        dz * dz + dx * dx
    }
}

/// Refines `child` into the full padded grid, `(cw * 4) x (ch * 4)` cells.
///
/// Only the first `(cw - 1) * 4` columns of the first `(ch - 1) * 4` rows
/// are written; the rest stays zero.
pub(super) fn refine_padded(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    child: &[i32],
    child_area: Rect,
) -> Vec<i32> {
    let cw = child_area.width;
    let padded_width = cw << SHIFT;
    let mut padded = cache.take(padded_width * (child_area.height << SHIFT));
    let span = CELL as f64;

    for cz in 0..child_area.height - 1 {
        let z = child_area.z.wrapping_add(cz as i32);
        let mut top_left = child[cz * cw];
        let mut bottom_left = child[(cz + 1) * cw];

        for cx in 0..cw - 1 {
            let x = child_area.x.wrapping_add(cx as i32);
            let points = [
                FeaturePoint::jittered(rng, x, z, 0.0, 0.0),
                FeaturePoint::jittered(rng, x.wrapping_add(1), z, span, 0.0),
                FeaturePoint::jittered(rng, x, z.wrapping_add(1), 0.0, span),
                FeaturePoint::jittered(rng, x.wrapping_add(1), z.wrapping_add(1), span, span),
            ];
            let top_right = child[cx + 1 + cz * cw];
            let bottom_right = child[cx + 1 + (cz + 1) * cw];
            let ids = [top_left, top_right, bottom_left, bottom_right];

            for row in 0..CELL {
                let start = ((cz << SHIFT) + row) * padded_width + (cx << SHIFT);
                for (col, cell) in padded[start..start + CELL].iter_mut().enumerate() {
                    let dist = points.map(|p| p.distance_sq(col, row));
                    *cell = ids[nearest_corner(dist)];
                }
            }

            top_left = top_right;
            bottom_left = bottom_right;
        }
    }
    padded
}

pub(super) fn zoom_voronoi(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    child: &[i32],
    child_area: Rect,
    area: Rect,
) -> Vec<i32> {
    let padded = refine_padded(rng, cache, child, child_area);
    let x = area.x.wrapping_sub(2);
    let z = area.z.wrapping_sub(2);
    let out = crop(
        cache,
        &padded,
        child_area.width << SHIFT,
        area,
        (x & 3) as usize,
        (z & 3) as usize,
    );
    cache.recycle(padded);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_rect() {
        assert_eq!(child_rect(Rect::new(0, 0, 16, 16)), Rect::new(-1, -1, 7, 7));
        assert_eq!(child_rect(Rect::new(6, 10, 5, 1)), Rect::new(1, 2, 4, 3));
        assert_eq!(child_rect(Rect::new(-3, -6, 4, 4)), Rect::new(-2, -2, 4, 4));
    }

    #[test]
    fn test_nearest_corner_ties_fall_through() {
        assert_eq!(nearest_corner([0.5, 1.0, 1.0, 1.0]), 0);
        assert_eq!(nearest_corner([1.0, 0.5, 1.0, 1.0]), 1);
        assert_eq!(nearest_corner([1.0, 1.0, 0.5, 1.0]), 2);
        assert_eq!(nearest_corner([1.0, 1.0, 1.0, 0.5]), 3);

        // TL and TR tie for nearest: neither is strictly smaller.
        assert_eq!(nearest_corner([0.5, 0.5, 1.0, 1.0]), 3);
        // TR and BL tie: falls past both.
        assert_eq!(nearest_corner([2.0, 0.5, 0.5, 1.0]), 3);
        // All equal.
        assert_eq!(nearest_corner([1.0; 4]), 3);
    }

    #[test]
    fn test_resolution_law() {
        let mut cache = ArraysCache::new();
        let mut rng = SeededRng::for_layer(12345, 10);
        let child_area = Rect::new(-3, 5, 6, 4);
        let child: Vec<i32> = (0..24).map(|i| 100 + i).collect();

        let padded = refine_padded(&mut rng, &mut cache, &child, child_area);
        let padded_width = child_area.width * 4;
        assert_eq!(padded.len(), padded_width * child_area.height * 4);

        for cz in 0..child_area.height - 1 {
            for cx in 0..child_area.width - 1 {
                let allowed = [
                    child[cx + cz * 6],
                    child[cx + 1 + cz * 6],
                    child[cx + (cz + 1) * 6],
                    child[cx + 1 + (cz + 1) * 6],
                ];
                for row in 0..4 {
                    for col in 0..4 {
                        let v = padded[(cz * 4 + row) * padded_width + cx * 4 + col];
                        assert!(allowed.contains(&v), "block ({cx}, {cz}) leaked id {v}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_uniform_child_stays_uniform() {
        let mut cache = ArraysCache::new();
        let mut rng = SeededRng::for_layer(1, 10);
        let area = Rect::new(-7, 13, 21, 9);
        let child_area = child_rect(area);
        let child = vec![42; child_area.area()];
        let out = zoom_voronoi(&mut rng, &mut cache, &child, child_area, area);
        assert_eq!(out.len(), area.area());
        assert!(out.iter().all(|&id| id == 42));
    }
}

//! Per-cell stage transforms.
//!
//! Every function writes a fresh buffer drawn from the cache and leaves the
//! child grid untouched. Cells are re-seeded from their absolute coordinate
//! before drawing, which makes a cell's value independent of the window it
//! was requested through.

use strata_core::ArraysCache;

use super::Rect;
use crate::rng::SeededRng;

/// Child rectangle for 2x zoom.
pub(super) const fn zoom_child_rect(area: Rect) -> Rect {
    Rect::new(
        area.x >> 1,
        area.z >> 1,
        (area.width >> 1) + 2,
        (area.height >> 1) + 2,
    )
}

/// Child rectangle for stages reading a one-cell border.
pub(super) const fn padded_child_rect(area: Rect) -> Rect {
    Rect::new(
        area.x.wrapping_sub(1),
        area.z.wrapping_sub(1),
        area.width + 2,
        area.height + 2,
    )
}

#[inline]
fn seed_cell(rng: &mut SeededRng, area: Rect, col: usize, row: usize) {
    rng.init_chunk_seed(
        i64::from(area.x.wrapping_add(col as i32)),
        i64::from(area.z.wrapping_add(row as i32)),
    );
}

/// Copies a `area.width * area.height` window out of a padded buffer.
pub(super) fn crop(
    cache: &mut ArraysCache,
    padded: &[i32],
    padded_width: usize,
    area: Rect,
    offset_x: usize,
    offset_z: usize,
) -> Vec<i32> {
    let mut out = cache.take(area.area());
    for (row, dst) in out.chunks_exact_mut(area.width).enumerate() {
        let start = (row + offset_z) * padded_width + offset_x;
        dst.copy_from_slice(&padded[start..start + area.width]);
    }
    out
}

pub(super) fn island(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    area: Rect,
    land: i32,
    ocean: i32,
) -> Vec<i32> {
    let mut out = cache.take(area.area());
    for row in 0..area.height {
        for col in 0..area.width {
            seed_cell(rng, area, col, row);
            out[col + row * area.width] = if rng.next_int(10) == 0 { land } else { ocean };
        }
    }

    if area.contains(0, 0) {
        let col = area.x.unsigned_abs() as usize;
        let row = area.z.unsigned_abs() as usize;
        out[col + row * area.width] = land;
    }
    out
}

pub(super) fn base(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    area: Rect,
    biomes: &[i32],
) -> Vec<i32> {
    let bound = biomes.len() as i32;
    let mut out = cache.take(area.area());
    for row in 0..area.height {
        for col in 0..area.width {
            seed_cell(rng, area, col, row);
            out[col + row * area.width] = biomes[rng.next_int(bound) as usize];
        }
    }
    out
}

/// Majority value of a quad, preferring the top-left on ties it takes part
/// in; a random pick of the four when nothing decides.
pub(super) fn mode_or_random(rng: &mut SeededRng, a: i32, b: i32, c: i32, d: i32) -> i32 {
    let a_wins = (a == b && (a == c || a == d || c != d))
        || (a == c && (a == d || b != d))
        || (a == d && b != c);
    if a_wins {
        a
    } else if (b == c && a != d) || (b == d && a != c) {
        b
    } else if c == d && a != b {
        c
    } else {
        rng.choose4(a, b, c, d)
    }
}

pub(super) fn zoom(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    child: &[i32],
    child_area: Rect,
    area: Rect,
) -> Vec<i32> {
    let cw = child_area.width;
    let padded_width = (cw - 1) << 1;
    let padded_height = (child_area.height - 1) << 1;
    let mut padded = cache.take(padded_width * padded_height);

    for cz in 0..child_area.height - 1 {
        let mut i = (cz << 1) * padded_width;
        let mut top_left = child[cz * cw];
        let mut bottom_left = child[(cz + 1) * cw];

        for cx in 0..cw - 1 {
            rng.init_chunk_seed(
                i64::from(child_area.x.wrapping_add(cx as i32) << 1),
                i64::from(child_area.z.wrapping_add(cz as i32) << 1),
            );
            let top_right = child[cx + 1 + cz * cw];
            let bottom_right = child[cx + 1 + (cz + 1) * cw];

            padded[i] = top_left;
            padded[i + padded_width] = rng.choose2(top_left, bottom_left);
            i += 1;
            padded[i] = rng.choose2(top_left, top_right);
            padded[i + padded_width] =
                mode_or_random(rng, top_left, top_right, bottom_left, bottom_right);
            i += 1;

            top_left = top_right;
            bottom_left = bottom_right;
        }
    }

    let out = crop(
        cache,
        &padded,
        padded_width,
        area,
        (area.x & 1) as usize,
        (area.z & 1) as usize,
    );
    cache.recycle(padded);
    out
}

pub(super) fn add_island(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    child: &[i32],
    area: Rect,
    ocean: i32,
) -> Vec<i32> {
    let cw = area.width + 2;
    let mut out = cache.take(area.area());

    for row in 0..area.height {
        for col in 0..area.width {
            let corners = [
                child[col + row * cw],
                child[col + 2 + row * cw],
                child[col + (row + 2) * cw],
                child[col + 2 + (row + 2) * cw],
            ];
            let centre = child[col + 1 + (row + 1) * cw];
            seed_cell(rng, area, col, row);

            out[col + row * area.width] =
                if centre == ocean && corners.iter().any(|&id| id != ocean) {
                    let mut candidate = ocean;
                    let mut seen = 1;
                    for corner in corners {
                        if corner != ocean {
                            if rng.next_int(seen) == 0 {
                                candidate = corner;
                            }
                            seen += 1;
                        }
                    }
                    if rng.next_int(3) == 0 {
                        candidate
                    } else {
                        ocean
                    }
                } else if centre != ocean && corners.contains(&ocean) {
                    if rng.next_int(5) == 0 {
                        ocean
                    } else {
                        centre
                    }
                } else {
                    centre
                };
        }
    }
    out
}

pub(super) fn assign_biomes(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    child: &[i32],
    area: Rect,
    ocean: i32,
    biomes: &[i32],
) -> Vec<i32> {
    let bound = biomes.len() as i32;
    let mut out = cache.take(area.area());
    for row in 0..area.height {
        for col in 0..area.width {
            let i = col + row * area.width;
            seed_cell(rng, area, col, row);
            out[i] = if child[i] == ocean {
                ocean
            } else {
                biomes[rng.next_int(bound) as usize]
            };
        }
    }
    out
}

pub(super) fn smooth(
    rng: &mut SeededRng,
    cache: &mut ArraysCache,
    child: &[i32],
    area: Rect,
) -> Vec<i32> {
    let cw = area.width + 2;
    let mut out = cache.take(area.area());

    for row in 0..area.height {
        for col in 0..area.width {
            let left = child[col + (row + 1) * cw];
            let right = child[col + 2 + (row + 1) * cw];
            let top = child[col + 1 + row * cw];
            let bottom = child[col + 1 + (row + 2) * cw];
            let mut centre = child[col + 1 + (row + 1) * cw];

            if left == right && top == bottom {
                seed_cell(rng, area, col, row);
                centre = rng.choose2(left, top);
            } else {
                if left == right {
                    centre = left;
                }
                if top == bottom {
                    centre = top;
                }
            }
            out[col + row * area.width] = centre;
        }
    }
    out
}

pub(super) fn shore(
    cache: &mut ArraysCache,
    child: &[i32],
    area: Rect,
    ocean: i32,
    shore: i32,
) -> Vec<i32> {
    let cw = area.width + 2;
    let mut out = cache.take(area.area());

    for row in 0..area.height {
        for col in 0..area.width {
            let centre = child[col + 1 + (row + 1) * cw];
            let neighbours = [
                child[col + (row + 1) * cw],
                child[col + 2 + (row + 1) * cw],
                child[col + 1 + row * cw],
                child[col + 1 + (row + 2) * cw],
            ];
            out[col + row * area.width] = if centre != ocean && neighbours.contains(&ocean) {
                shore
            } else {
                centre
            };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> SeededRng {
        SeededRng::for_layer(12345, 1)
    }

    #[test]
    fn test_child_rects() {
        assert_eq!(zoom_child_rect(Rect::new(-5, 4, 16, 9)), Rect::new(-3, 2, 10, 6));
        assert_eq!(padded_child_rect(Rect::new(0, 0, 3, 4)), Rect::new(-1, -1, 5, 6));
    }

    #[test]
    fn test_base_matches_stream() {
        let mut cache = ArraysCache::new();
        let biomes: Vec<i32> = (10..20).collect();
        let grid = base(&mut rng(), &mut cache, Rect::new(0, 0, 1, 1), &biomes);
        // First draw for cell (0, 0) is 2.
        assert_eq!(grid, [12]);
    }

    #[test]
    fn test_island_origin_is_land() {
        let mut cache = ArraysCache::new();
        for area in [Rect::new(-3, -3, 7, 7), Rect::new(0, 0, 1, 1), Rect::new(-1, 0, 2, 1)] {
            let grid = island(&mut rng(), &mut cache, area, 1, 0);
            let col = (-area.x) as usize;
            let row = (-area.z) as usize;
            assert_eq!(grid[col + row * area.width], 1);
            assert!(grid.iter().all(|&id| id == 0 || id == 1));
        }
    }

    #[test]
    fn test_mode_or_random_majority() {
        let mut r = rng();
        r.init_chunk_seed(0, 0);
        assert_eq!(mode_or_random(&mut r, 1, 2, 2, 2), 2);
        assert_eq!(mode_or_random(&mut r, 3, 3, 3, 9), 3);
        assert_eq!(mode_or_random(&mut r, 4, 4, 5, 6), 4);
        assert_eq!(mode_or_random(&mut r, 5, 6, 7, 7), 7);
        assert_eq!(mode_or_random(&mut r, 5, 6, 6, 7), 6);
        let tied = mode_or_random(&mut r, 1, 1, 2, 2);
        assert!(tied == 1 || tied == 2);
        let picked = mode_or_random(&mut r, 1, 2, 3, 4);
        assert!((1..=4).contains(&picked));
    }

    #[test]
    fn test_mode_or_random_draws_only_when_undecided() {
        let mut r = rng();
        r.init_chunk_seed(3, -8);
        let before = r;
        for quad in [[7, 7, 7, 7], [7, 8, 8, 8], [7, 7, 8, 9], [7, 8, 9, 7], [7, 8, 9, 9]] {
            let [a, b, c, d] = quad;
            let _ = mode_or_random(&mut r, a, b, c, d);
            assert_eq!(r, before, "{quad:?}");
        }
        let _ = mode_or_random(&mut r, 1, 2, 1, 2);
        assert_ne!(r, before);
    }

    #[test]
    fn test_zoom_keeps_top_left() {
        let mut cache = ArraysCache::new();
        let area = Rect::new(0, 0, 6, 6);
        let child_area = zoom_child_rect(area);
        assert_eq!(child_area, Rect::new(0, 0, 5, 5));

        let child: Vec<i32> = (0..25).collect();
        let grid = zoom(&mut rng(), &mut cache, &child, child_area, area);
        for row in (0..6).step_by(2) {
            for col in (0..6).step_by(2) {
                assert_eq!(grid[col + row * 6], child[col / 2 + (row / 2) * 5]);
            }
        }
    }

    #[test]
    fn test_uniform_input_is_fixed_point() {
        let mut cache = ArraysCache::new();
        let area = Rect::new(3, -8, 6, 5);
        let child = vec![7; padded_child_rect(area).area()];
        assert!(smooth(&mut rng(), &mut cache, &child, area).iter().all(|&id| id == 7));
        assert!(add_island(&mut rng(), &mut cache, &child, area, 0).iter().all(|&id| id == 7));
        assert!(shore(&mut cache, &child, area, 0, 16).iter().all(|&id| id == 7));

        let zoomed_child = vec![7; zoom_child_rect(area).area()];
        let grid = zoom(&mut rng(), &mut cache, &zoomed_child, zoom_child_rect(area), area);
        assert!(grid.iter().all(|&id| id == 7));
    }

    #[test]
    fn test_shore_marks_coast() {
        let mut cache = ArraysCache::new();
        // 3x3 padded child around a single output cell.
        let child = [0, 0, 0, 5, 5, 5, 5, 5, 5];
        assert_eq!(shore(&mut cache, &child, Rect::new(0, 0, 1, 1), 0, 16), [16]);
        let child = [5, 0, 5, 5, 5, 5, 5, 5, 5];
        assert_eq!(shore(&mut cache, &child, Rect::new(0, 0, 1, 1), 0, 16), [16]);
        let child = [0, 5, 0, 5, 5, 5, 0, 5, 0];
        assert_eq!(shore(&mut cache, &child, Rect::new(0, 0, 1, 1), 0, 16), [5]);
    }

    #[test]
    fn test_smooth_line_vote() {
        let mut cache = ArraysCache::new();
        // left == right only
        let child = [9, 1, 9, 4, 6, 4, 9, 2, 9];
        assert_eq!(smooth(&mut rng(), &mut cache, &child, Rect::new(0, 0, 1, 1)), [4]);
        // top == bottom only
        let child = [9, 3, 9, 1, 6, 2, 9, 3, 9];
        assert_eq!(smooth(&mut rng(), &mut cache, &child, Rect::new(0, 0, 1, 1)), [3]);
        // no agreement
        let child = [9, 3, 9, 1, 6, 2, 9, 4, 9];
        assert_eq!(smooth(&mut rng(), &mut cache, &child, Rect::new(0, 0, 1, 1)), [6]);
    }

    #[test]
    fn test_assign_biomes_keeps_ocean() {
        let mut cache = ArraysCache::new();
        let area = Rect::new(0, 0, 4, 4);
        let child: Vec<i32> = (0..16).map(|i| i % 2).collect();
        let grid = assign_biomes(&mut rng(), &mut cache, &child, area, 0, &[20, 21]);
        for (c, g) in child.iter().zip(&grid) {
            if *c == 0 {
                assert_eq!(*g, 0);
            } else {
                assert!(*g == 20 || *g == 21);
            }
        }
    }

    #[test]
    fn test_crop_offsets() {
        let mut cache = ArraysCache::new();
        let padded: Vec<i32> = (0..20).collect(); // 5 wide, 4 tall
        let out = crop(&mut cache, &padded, 5, Rect::new(0, 0, 2, 2), 1, 2);
        assert_eq!(out, [11, 12, 16, 17]);
    }
}

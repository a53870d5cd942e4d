//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is split into a grid of tiles, each tile gets its own clipped
//! histogram equalization curve, and every pixel blends the curves of the four
//! nearest tile centers so no seams appear at tile edges.

use image::{GrayImage, Luma};

/// Tile grid used by the enhancement stage: (columns, rows).
pub const CLAHE_TILE_GRID: (u32, u32) = (8, 8);

/// Equalizes `image` tile by tile.
///
/// `clip_limit` is relative to a flat histogram: a bin may hold at most
/// `clip_limit * tile_area / 256` pixels before the excess is spread over all
/// bins. A limit <= 0 disables clipping.
pub fn equalize_adaptive(image: &GrayImage, tiles: (u32, u32), clip_limit: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles_x = tiles.0.clamp(1, width) as usize;
    let tiles_y = tiles.1.clamp(1, height) as usize;
    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;

    let tile_span = |index: usize, size: f32, count: usize, limit: u32| -> (u32, u32) {
        let start = (index as f32 * size).floor() as u32;
        let end = if index + 1 == count {
            limit
        } else {
            ((index + 1) as f32 * size).floor() as u32
        };
        (start, end.max(start + 1).min(limit))
    };

    let mut luts = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        let (y0, y1) = tile_span(ty, tile_h, tiles_y, height);
        for tx in 0..tiles_x {
            let (x0, x1) = tile_span(tx, tile_w, tiles_x, width);
            luts.push(tile_lut(image, (x0, x1), (y0, y1), clip_limit));
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y)[0] as usize;

        // Position relative to tile centers
        let fx = (x as f32 + 0.5) / tile_w - 0.5;
        let fy = (y as f32 + 0.5) / tile_h - 0.5;
        let (tx0, tx1, ax) = neighbours(fx, tiles_x);
        let (ty0, ty1, ay) = neighbours(fy, tiles_y);

        let top = luts[ty0 * tiles_x + tx0][value] as f32 * (1.0 - ax)
            + luts[ty0 * tiles_x + tx1][value] as f32 * ax;
        let bottom = luts[ty1 * tiles_x + tx0][value] as f32 * (1.0 - ax)
            + luts[ty1 * tiles_x + tx1][value] as f32 * ax;

        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// The two tile indices surrounding position `f` and the weight of the second.
fn neighbours(f: f32, count: usize) -> (usize, usize, f32) {
    let last = count as i32 - 1;
    let base = f.floor() as i32;
    let first = base.clamp(0, last) as usize;
    let second = (base + 1).clamp(0, last) as usize;
    let weight = if first == second { 0.0 } else { f - f.floor() };
    (first, second, weight)
}

/// Clipped-histogram equalization curve for one tile.
fn tile_lut(image: &GrayImage, xs: (u32, u32), ys: (u32, u32), clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in ys.0..ys.1 {
        for x in xs.0..xs.1 {
            hist[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (xs.1 - xs.0) * (ys.1 - ys.0);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }

        let share = excess / 256;
        let leftover = (excess % 256) as usize;
        // Spread the leftover across the range rather than piling it at the dark end
        let step = if leftover > 0 { 256 / leftover } else { 0 };
        for bin in hist.iter_mut() {
            *bin += share;
        }
        for i in 0..leftover {
            hist[i * step] += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (value, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[value] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(64, 48, Luma([90]));
        let out = equalize_adaptive(&img, CLAHE_TILE_GRID, 2.0);

        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_unclipped_single_tile_stretches_range() {
        // Half 100, half 110
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 100 } else { 110 }]));

        let out = equalize_adaptive(&img, (1, 1), 0.0);

        assert_eq!(out.get_pixel(0, 0)[0], 128);
        assert_eq!(out.get_pixel(9, 9)[0], 255);
    }

    #[test]
    fn test_clip_limit_reduces_amplification() {
        let img = GrayImage::from_fn(32, 32, |x, _| Luma([if x < 16 { 100 } else { 110 }]));

        let unclipped = equalize_adaptive(&img, (1, 1), 0.0);
        let clipped = equalize_adaptive(&img, (1, 1), 2.0);

        let spread = |im: &GrayImage| im.get_pixel(31, 0)[0] as i32 - im.get_pixel(0, 0)[0] as i32;
        assert!(spread(&clipped) < spread(&unclipped));
        assert!(spread(&clipped) > 0);
    }

    #[test]
    fn test_preserves_ordering_and_size() {
        let img = GrayImage::from_fn(80, 60, |x, y| Luma([(x + y) as u8]));
        let out = equalize_adaptive(&img, CLAHE_TILE_GRID, 3.0);

        assert_eq!(out.dimensions(), (80, 60));
        // Monotone along a row inside one tile column band
        assert!(out.get_pixel(0, 30)[0] <= out.get_pixel(79, 30)[0]);
    }

    #[test]
    fn test_more_tiles_than_pixels() {
        let img = GrayImage::from_fn(3, 2, |x, _| Luma([x as u8 * 50]));
        let out = equalize_adaptive(&img, (8, 8), 2.0);
        assert_eq!(out.dimensions(), (3, 2));
    }
}

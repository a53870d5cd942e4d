//! Resizing prepared forms to a canonical size.
//!
//! Shrinking uses area averaging: every output pixel is the coverage-weighted
//! mean of the source pixels it overlaps. Point-sampling filters alias badly on
//! thin printed strokes when a high-resolution scan is reduced several times.

use image::imageops::FilterType;
use image::{ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};

/// Output dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Canonical size of a prepared request form.
pub const DEFAULT_TARGET_SIZE: TargetSize = TargetSize::new(1024, 768);

/// Resizes `image` to exactly `target`, ignoring the source aspect ratio.
pub fn scale_image<P>(image: &ImageBuffer<P, Vec<u8>>, target: TargetSize) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (src_w, src_h) = image.dimensions();

    if (src_w, src_h) == (target.width, target.height) {
        return image.clone();
    }
    if target.width == 0 || target.height == 0 || src_w == 0 || src_h == 0 {
        return ImageBuffer::new(target.width, target.height);
    }

    if target.width <= src_w && target.height <= src_h {
        resize_area(image, target)
    } else {
        // Enlarging: area averaging degenerates to nearest neighbour, so blend instead
        image::imageops::resize(image, target.width, target.height, FilterType::Triangle)
    }
}

/// Source spans covered by each output position along one axis: (source index, weight).
fn area_weights(src_len: u32, dst_len: u32) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = start + scale;
            let mut weights = Vec::new();
            let mut s = start.floor() as u32;
            while (s as f64) < end && s < src_len {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                if hi > lo {
                    weights.push((s as usize, ((hi - lo) / scale) as f32));
                }
                s += 1;
            }
            weights
        })
        .collect()
}

fn resize_area<P>(image: &ImageBuffer<P, Vec<u8>>, target: TargetSize) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (src_w, src_h) = image.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let dst_w = target.width as usize;
    let dst_h = target.height as usize;
    let src: &[u8] = image.as_raw();

    let col_weights = area_weights(src_w, target.width);
    let row_weights = area_weights(src_h, target.height);

    // Horizontal pass: src_h rows of dst_w pixels
    let mut horizontal = vec![0f32; src_h as usize * dst_w * channels];
    for y in 0..src_h as usize {
        let src_row = &src[y * src_w as usize * channels..(y + 1) * src_w as usize * channels];
        for (dx, weights) in col_weights.iter().enumerate() {
            let out = &mut horizontal[(y * dst_w + dx) * channels..(y * dst_w + dx + 1) * channels];
            for &(sx, w) in weights {
                for c in 0..channels {
                    out[c] += src_row[sx * channels + c] as f32 * w;
                }
            }
        }
    }

    // Vertical pass
    let mut output: ImageBuffer<P, Vec<u8>> = ImageBuffer::new(target.width, target.height);
    let out_raw: &mut [u8] = &mut output;
    for (dy, weights) in row_weights.iter().enumerate() {
        for dx in 0..dst_w {
            for c in 0..channels {
                let mut acc = 0f32;
                for &(sy, w) in weights {
                    acc += horizontal[(sy * dst_w + dx) * channels + c] * w;
                }
                out_raw[(dy * dst_w + dx) * channels + c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_exact_output_dimensions() {
        let img = RgbImage::from_pixel(1275, 1650, Rgb([120, 130, 140]));

        for target in [
            TargetSize::new(1024, 768),
            TargetSize::new(300, 900),
            TargetSize::new(2000, 100),
            TargetSize::new(1275, 1650),
        ] {
            let scaled = scale_image(&img, target);
            assert_eq!(scaled.dimensions(), (target.width, target.height));
        }
    }

    #[test]
    fn test_uniform_color_preserved_when_shrinking() {
        let img = RgbImage::from_pixel(301, 199, Rgb([10, 200, 77]));
        let scaled = scale_image(&img, TargetSize::new(97, 61));
        assert!(scaled.pixels().all(|p| *p == Rgb([10, 200, 77])));
    }

    #[test]
    fn test_area_average_of_checkerboard() {
        let img = GrayImage::from_fn(4, 4, |x, y| {
            if (x + y) % 2 == 0 { Luma([0]) } else { Luma([255]) }
        });

        let scaled = scale_image(&img, TargetSize::new(2, 2));

        for p in scaled.pixels() {
            assert!((127..=128).contains(&p[0]), "got {}", p[0]);
        }
    }

    #[test]
    fn test_fractional_coverage() {
        // Three columns shrink to two: middle column is shared half and half
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[0, 90, 180][x as usize]]));
        let scaled = scale_image(&img, TargetSize::new(2, 1));

        assert_eq!(scaled.get_pixel(0, 0)[0], 30);
        assert_eq!(scaled.get_pixel(1, 0)[0], 150);
    }

    #[test]
    fn test_area_weights_sum_to_one() {
        for (src, dst) in [(10, 3), (1650, 768), (7, 7), (5, 1)] {
            for weights in area_weights(src, dst) {
                let total: f32 = weights.iter().map(|(_, w)| w).sum();
                assert!((total - 1.0).abs() < 1e-4);
            }
        }
    }
}

//! Contrast enhancement and binarization for OCR.
//!
//! Forms carry very dark ink next to near-white paper, so contrast is
//! equalized per tile rather than globally. Binarization is a plain global
//! threshold, tuned per batch with the interactive tuner.

pub mod clahe;

pub use clahe::{CLAHE_TILE_GRID, equalize_adaptive};

use image::{GenericImageView, GrayImage, ImageBuffer, Pixel, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::prepare::color::{from_hsv, to_hsv};

/// Largest contrast offset accepted. The gain `(127 + c) / (127 - c)` diverges at 127.
pub const MAX_CONTRAST_OFFSET: i32 = 126;

/// Neutral slider position for brightness and contrast.
pub const NEUTRAL_SLIDER: u8 = 50;
/// Slider maximum for brightness and contrast.
pub const SLIDER_MAX: u8 = 100;
/// Threshold used when nothing was calibrated.
pub const DEFAULT_THRESHOLD: u8 = 127;

/// Brightness, contrast and threshold as chosen in the tuner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentParameters {
    /// 0-100, 50 is neutral
    pub brightness: u8,
    /// 0-100, 50 is neutral
    pub contrast: u8,
    /// 0-255
    pub threshold: u8,
}

impl Default for AdjustmentParameters {
    fn default() -> Self {
        Self {
            brightness: NEUTRAL_SLIDER,
            contrast: NEUTRAL_SLIDER,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AdjustmentParameters {
    /// Signed brightness offset, -127..=127.
    pub fn brightness_offset(&self) -> i32 {
        slider_to_offset(self.brightness)
    }

    /// Signed contrast offset, -127..=127 (clamped further by the enhancer).
    pub fn contrast_offset(&self) -> i32 {
        slider_to_offset(self.contrast)
    }

    /// True when brightness and contrast leave pixels untouched.
    pub fn is_neutral(&self) -> bool {
        self.brightness_offset() == 0 && self.contrast_offset() == 0
    }

    /// Applies brightness and contrast. Neutral sliders return a plain copy.
    pub fn adjust<P>(&self, image: &ImageBuffer<P, Vec<u8>>) -> ImageBuffer<P, Vec<u8>>
    where
        P: Pixel<Subpixel = u8>,
    {
        if self.is_neutral() {
            return image.clone();
        }
        adjust_brightness_contrast(image, self.brightness_offset(), self.contrast_offset())
    }

    /// Text drawn over the tuner preview, one line per parameter.
    pub fn overlay_lines(&self) -> [String; 3] {
        [
            format!("Brightness: {}", self.brightness),
            format!("Contrast: {}", self.contrast),
            format!("Threshold: {}", self.threshold),
        ]
    }
}

/// `(value - 50) * 2.55`, truncated toward zero.
fn slider_to_offset(value: u8) -> i32 {
    (value.min(SLIDER_MAX) as i32 - NEUTRAL_SLIDER as i32) * 255 / 100
}

/// Adds `boost` to the saturation channel, saturating at 255.
pub fn boost_saturation(image: &RgbImage, boost: u8) -> RgbImage {
    if boost == 0 {
        return image.clone();
    }

    let mut hsv = to_hsv(image);
    for pixel in hsv.pixels_mut() {
        pixel[1] = pixel[1].saturating_add(boost);
    }
    from_hsv(&hsv)
}

/// Boosts saturation, converts to grayscale and applies CLAHE over an 8x8 grid.
pub fn enhance(image: &RgbImage, saturation_boost: u8, contrast_clip_limit: f32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return GrayImage::new(image.width(), image.height());
    }

    let saturated = boost_saturation(image, saturation_boost);
    let gray = image::imageops::grayscale(&saturated);
    let equalized = equalize_adaptive(&gray, CLAHE_TILE_GRID, contrast_clip_limit);

    debug!(
        saturation_boost,
        clip_limit = contrast_clip_limit,
        width = equalized.width(),
        height = equalized.height(),
        "Image enhanced"
    );

    equalized
}

/// Applies `out = in * alpha + beta` to every channel, clamped to [0, 255].
///
/// `brightness` and `contrast` are signed offsets where 0 means "no change".
/// The contrast gain pivots around mid-gray so contrast alone never shifts
/// overall brightness. With `contrast == 0` this is a pure add of `brightness`.
pub fn adjust_brightness_contrast<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    brightness: i32,
    contrast: i32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let lut = brightness_contrast_lut(brightness, contrast);
    let mut output = image.clone();
    for sample in output.iter_mut() {
        *sample = lut[*sample as usize];
    }
    output
}

fn brightness_contrast_lut(brightness: i32, contrast: i32) -> [u8; 256] {
    let brightness = brightness.clamp(-255, 255);
    let contrast = contrast.clamp(-MAX_CONTRAST_OFFSET, MAX_CONTRAST_OFFSET);

    let mut lut = [0u8; 256];
    if contrast == 0 {
        for (v, out) in lut.iter_mut().enumerate() {
            *out = (v as i32 + brightness).clamp(0, 255) as u8;
        }
        return lut;
    }

    let alpha = (127 + contrast) as f32 / (127 - contrast) as f32;
    let beta = 127.0 * (1.0 - alpha) + brightness as f32;
    for (v, out) in lut.iter_mut().enumerate() {
        *out = (v as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Converts to grayscale and thresholds: values >= `threshold` become 255, the rest 0.
pub fn binarize<I, P>(image: &I, threshold: u8) -> GrayImage
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut gray = image::imageops::grayscale(image);
    for sample in gray.iter_mut() {
        *sample = if *sample >= threshold { 255 } else { 0 };
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn gradient() -> RgbImage {
        RgbImage::from_fn(64, 32, |x, y| Rgb([(x * 4) as u8, (y * 8) as u8, ((x + y) * 3) as u8]))
    }

    #[test]
    fn test_zero_adjustment_is_identity() {
        let img = gradient();
        assert_eq!(adjust_brightness_contrast(&img, 0, 0), img);
    }

    #[test]
    fn test_brightness_saturates() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[0, 128, 250][x as usize]]));

        let brighter = adjust_brightness_contrast(&img, 20, 0);
        assert_eq!(brighter.as_raw(), &vec![20, 148, 255]);

        let darker = adjust_brightness_contrast(&img, -50, 0);
        assert_eq!(darker.as_raw(), &vec![0, 78, 200]);
    }

    #[test]
    fn test_contrast_pivots_around_mid_gray() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[27, 127, 227][x as usize]]));

        let out = adjust_brightness_contrast(&img, 0, 64);

        // alpha = 191 / 63, mid-gray fixed, extremes pushed apart
        assert_eq!(out.get_pixel(1, 0)[0], 127);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_negative_contrast_flattens() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([[0, 255][x as usize]]));
        let out = adjust_brightness_contrast(&img, 0, -100);

        assert!(out.get_pixel(0, 0)[0] > 90);
        assert!(out.get_pixel(1, 0)[0] < 170);
    }

    #[test]
    fn test_extreme_contrast_does_not_overflow() {
        let img = gradient();
        let out = adjust_brightness_contrast(&img, 255, 1000);
        assert_eq!(out.dimensions(), img.dimensions());
    }

    #[test]
    fn test_binarize_only_two_levels() {
        let img = gradient();
        for threshold in [0, 1, 100, 127, 254, 255] {
            let binary = binarize(&img, threshold);
            assert!(binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
        }
    }

    #[test]
    fn test_binarize_threshold_is_inclusive() {
        let img = GrayImage::from_fn(3, 1, |x, _| Luma([[126, 127, 128][x as usize]]));
        let binary = binarize(&img, 127);
        assert_eq!(binary.as_raw(), &vec![0, 255, 255]);
    }

    #[test]
    fn test_boost_saturation_saturates_channel() {
        let img = RgbImage::from_pixel(2, 2, Rgb([200, 100, 100]));

        let boosted = boost_saturation(&img, 255);
        let hsv = crate::prepare::color::rgb_to_hsv(boosted.get_pixel(0, 0).0);
        assert_eq!(hsv[1], 255);

        // Gray picks up a slight red tint (hue 0) but keeps its value
        let gray = RgbImage::from_pixel(1, 1, Rgb([128, 128, 128]));
        let tinted = boost_saturation(&gray, 10);
        assert_eq!(tinted.get_pixel(0, 0)[0], 128);
        assert!(tinted.get_pixel(0, 0)[2] < 128);
    }

    #[test]
    fn test_enhance_degenerate_image() {
        for (w, h) in [(0, 5), (5, 0), (0, 0)] {
            let out = enhance(&RgbImage::new(w, h), 30, 2.0);
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn test_default_parameters() {
        let params = AdjustmentParameters::default();
        assert_eq!((params.brightness, params.contrast, params.threshold), (50, 50, 127));
        assert_eq!(params.brightness_offset(), 0);
        assert!(params.is_neutral());
    }

    #[test]
    fn test_slider_offsets_truncate() {
        let params = AdjustmentParameters {
            brightness: 0,
            contrast: 100,
            threshold: 10,
        };
        assert_eq!(params.brightness_offset(), -127);
        assert_eq!(params.contrast_offset(), 127);

        let small = AdjustmentParameters {
            brightness: 51,
            contrast: 49,
            ..Default::default()
        };
        // 2.55 truncates to 2 in both directions
        assert_eq!(small.brightness_offset(), 2);
        assert_eq!(small.contrast_offset(), -2);
    }

    #[test]
    fn test_adjust_shifts_brightness() {
        let img = GrayImage::from_pixel(2, 2, Luma([100]));
        let params = AdjustmentParameters {
            brightness: 60,
            ..Default::default()
        };
        assert!(params.adjust(&img).pixels().all(|p| p[0] == 125));
        assert_eq!(AdjustmentParameters::default().adjust(&img), img);
    }

    #[test]
    fn test_overlay_lines() {
        let params = AdjustmentParameters {
            brightness: 60,
            contrast: 40,
            threshold: 200,
        };
        assert_eq!(
            params.overlay_lines(),
            [
                "Brightness: 60".to_string(),
                "Contrast: 40".to_string(),
                "Threshold: 200".to_string(),
            ]
        );
    }

    #[test]
    fn test_enhance_output_is_gray_same_size() {
        let img = gradient();
        let out = enhance(&img, 40, 2.0);
        assert_eq!(out.dimensions(), img.dimensions());
    }
}

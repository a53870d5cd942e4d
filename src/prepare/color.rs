//! HSV color handling and the named border color registry.
//!
//! HSV values follow the 8-bit convention used by most scanning tools:
//! hue is stored as degrees / 2 (0-179), saturation and value span 0-255.
//! The color math itself is done by `palette` in floating point.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{FromColor, Hsv as PaletteHsv, Srgb};

use crate::error::{FormError, Result};

/// Largest hue value in the 8-bit encoding.
pub const MAX_HUE: u8 = 179;

/// An HSV triple: [hue, saturation, value].
pub type Hsv = [u8; 3];

/// Inclusive HSV bounds describing one border color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorRange {
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// Returns true if every channel of `hsv` lies within the bounds.
    pub fn contains(&self, hsv: Hsv) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }

    /// Checks channel limits and bound ordering.
    pub fn is_valid(&self) -> bool {
        self.lower[0] <= MAX_HUE
            && self.upper[0] <= MAX_HUE
            && (0..3).all(|c| self.lower[c] <= self.upper[c])
    }
}

static REGISTRY: OnceLock<ColorRangeRegistry> = OnceLock::new();

/// Read-only mapping from color name to its HSV range.
#[derive(Debug, Clone)]
pub struct ColorRangeRegistry {
    ranges: BTreeMap<&'static str, ColorRange>,
}

impl ColorRangeRegistry {
    /// Returns the process-wide registry, building it on first use.
    pub fn global() -> &'static Self {
        REGISTRY.get_or_init(Self::builtin)
    }

    fn builtin() -> Self {
        let mut ranges = BTreeMap::new();
        // Faint printed blue frame on white paper: low saturation, bright.
        ranges.insert("blue", ColorRange::new([80, 5, 80], [100, 30, 255]));
        ranges.insert("black", ColorRange::new([0, 0, 0], [MAX_HUE, 255, 30]));
        Self { ranges }
    }

    pub fn get(&self, name: &str) -> Option<&ColorRange> {
        self.ranges.get(name)
    }

    /// Looks up a color, failing with `UnsupportedColor` for unknown names.
    pub fn lookup(&self, name: &str) -> Result<&ColorRange> {
        self.get(name).ok_or_else(|| FormError::UnsupportedColor {
            name: name.to_string(),
            supported: self.names(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ranges.contains_key(name)
    }

    /// Sorted list of registered color names.
    pub fn names(&self) -> Vec<String> {
        self.ranges.keys().map(|name| name.to_string()).collect()
    }
}

/// Converts one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> Hsv {
    let [r, g, b] = rgb;
    let hsv: PaletteHsv = PaletteHsv::from_color(Srgb::new(r, g, b).into_format::<f32>());

    let mut hue = (hsv.hue.into_positive_degrees() / 2.0).round() as u16;
    if hue > MAX_HUE as u16 {
        hue = 0; // 360 degrees wraps back to red
    }

    [hue as u8, to_byte(hsv.saturation), to_byte(hsv.value)]
}

/// Converts one 8-bit HSV pixel back to RGB.
pub fn hsv_to_rgb(hsv: Hsv) -> [u8; 3] {
    let [h, s, v] = hsv;
    let color: PaletteHsv = PaletteHsv::new(h as f32 * 2.0, s as f32 / 255.0, v as f32 / 255.0);
    let rgb: Srgb = Srgb::from_color(color);
    [to_byte(rgb.red), to_byte(rgb.green), to_byte(rgb.blue)]
}

fn to_byte(unit: f32) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Converts a whole image to HSV. Channels of the returned buffer hold H, S, V.
pub fn to_hsv(image: &RgbImage) -> RgbImage {
    let mut hsv = image.clone();
    for pixel in hsv.pixels_mut() {
        *pixel = Rgb(rgb_to_hsv(pixel.0));
    }
    hsv
}

/// Converts an HSV buffer produced by `to_hsv` back to RGB.
pub fn from_hsv(hsv: &RgbImage) -> RgbImage {
    let mut rgb = hsv.clone();
    for pixel in rgb.pixels_mut() {
        *pixel = Rgb(hsv_to_rgb(pixel.0));
    }
    rgb
}

/// Builds a binary mask: 255 where the pixel's HSV lies inside `range`, 0 elsewhere.
pub fn in_range_mask(image: &RgbImage, range: &ColorRange) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let hsv = rgb_to_hsv(image.get_pixel(x, y).0);
        Luma([if range.contains(hsv) { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
    }

    #[test]
    fn test_hue_near_360_wraps_to_red() {
        assert_eq!(rgb_to_hsv([255, 0, 1])[0], 0);
        assert_eq!(rgb_to_hsv([255, 0, 128])[0], 165);
    }

    #[test]
    fn test_hsv_round_trip_is_close() {
        for rgb in [[200, 220, 225], [12, 80, 40], [250, 10, 130], [90, 90, 90]] {
            let back = hsv_to_rgb(rgb_to_hsv(rgb));
            for c in 0..3 {
                let diff = (back[c] as i32 - rgb[c] as i32).abs();
                assert!(diff <= 3, "{:?} -> {:?}", rgb, back);
            }
        }
    }

    #[test]
    fn test_builtin_ranges_are_valid() {
        let registry = ColorRangeRegistry::global();
        assert_eq!(registry.names(), vec!["black", "blue"]);
        for name in registry.names() {
            assert!(registry.get(&name).unwrap().is_valid(), "{} out of range", name);
        }
    }

    #[test]
    fn test_lookup_unknown_color() {
        let err = ColorRangeRegistry::global().lookup("magenta").unwrap_err();
        assert!(matches!(err, FormError::UnsupportedColor { ref name, .. } if name == "magenta"));
    }

    #[test]
    fn test_pale_blue_is_in_blue_range() {
        let blue = ColorRangeRegistry::global().get("blue").unwrap();
        assert!(blue.contains(rgb_to_hsv([200, 220, 225])));
        assert!(!blue.contains(rgb_to_hsv([255, 255, 255])));
        assert!(!blue.contains(rgb_to_hsv([0, 0, 0])));
    }

    #[test]
    fn test_in_range_mask() {
        let mut img = RgbImage::from_pixel(4, 1, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([10, 10, 10]));
        img.put_pixel(2, 0, Rgb([20, 5, 0]));

        let black = ColorRangeRegistry::global().get("black").unwrap();
        let mask = in_range_mask(&img, black);

        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
        assert_eq!(mask.get_pixel(2, 0)[0], 255);
        assert_eq!(mask.get_pixel(3, 0)[0], 0);
    }

    #[test]
    fn test_invalid_range_detected() {
        assert!(!ColorRange::new([10, 0, 0], [180, 255, 255]).is_valid());
        assert!(!ColorRange::new([50, 0, 0], [40, 255, 255]).is_valid());
    }
}

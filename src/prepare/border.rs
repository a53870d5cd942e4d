//! Border detection: crops a page to the printed colored frame of the form.
//!
//! The mask is closed before it is opened. The frame is a thin painted line,
//! so small gaps must be bridged before noise removal or the open would eat
//! the frame itself.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use tracing::{debug, info, warn};

use super::color::{ColorRange, ColorRangeRegistry, in_range_mask};
use crate::error::Result;

/// Pixels added on every side of the detected frame.
pub const BORDER_PADDING: u32 = 20;

/// Smallest contour area (square pixels) accepted as a form border.
pub const DEFAULT_MIN_BORDER_AREA: f64 = 5000.0;

/// An axis-aligned rectangle in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Grows the rectangle by `padding` on all sides, clamped to `bounds` (width, height).
    pub fn expand(&self, padding: u32, bounds: (u32, u32)) -> PixelRect {
        let (max_w, max_h) = bounds;
        let x0 = self.x.saturating_sub(padding);
        let y0 = self.y.saturating_sub(padding);
        let x1 = (self.x + self.width + padding).min(max_w);
        let y1 = (self.y + self.height + padding).min(max_h);
        PixelRect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

/// What border detection found on a page.
#[derive(Clone, Debug, PartialEq)]
pub enum BorderOutcome {
    /// A frame was found. `bounds` is the frame itself, `crop` the padded region returned.
    Detected {
        bounds: PixelRect,
        crop: PixelRect,
        area: f64,
    },
    /// No pixels of the border color survived mask cleanup.
    NotFound,
    /// Contours exist but none reach the minimum area.
    BelowMinArea { largest_area: f64 },
}

impl BorderOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected { .. })
    }

    /// Short description for logs and stored records.
    pub fn describe(&self) -> String {
        match self {
            Self::Detected { crop, .. } => format!(
                "detected ({}x{} at {},{})",
                crop.width, crop.height, crop.x, crop.y
            ),
            Self::NotFound => "not found".to_string(),
            Self::BelowMinArea { largest_area } => {
                format!("below minimum area (largest {:.0})", largest_area)
            }
        }
    }
}

/// Result of a crop: the (possibly uncropped) image plus how it was obtained.
#[derive(Clone, Debug)]
pub struct BorderCrop {
    pub image: RgbImage,
    pub outcome: BorderOutcome,
}

impl BorderCrop {
    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Finds and crops to a colored form border.
#[derive(Clone, Copy, Debug)]
pub struct BorderDetector {
    pub min_area: f64,
    pub padding: u32,
}

impl Default for BorderDetector {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_BORDER_AREA,
            padding: BORDER_PADDING,
        }
    }
}

impl BorderDetector {
    pub fn new(min_area: f64, padding: u32) -> Self {
        Self { min_area, padding }
    }

    /// Crops `image` to the border of the named color.
    ///
    /// Fails only for an unknown color. When no border qualifies, the original
    /// image is returned unchanged with a non-detected outcome.
    pub fn crop(&self, image: &RgbImage, color_name: &str) -> Result<BorderCrop> {
        let range = ColorRangeRegistry::global().lookup(color_name)?;
        let outcome = self.locate(image, range);

        match &outcome {
            BorderOutcome::Detected { crop, .. } => {
                debug!(color = color_name, outcome = %outcome.describe(), "Border located");
                let cropped =
                    image::imageops::crop_imm(image, crop.x, crop.y, crop.width, crop.height)
                        .to_image();
                Ok(BorderCrop {
                    image: cropped,
                    outcome,
                })
            }
            _ => {
                warn!(
                    color = color_name,
                    outcome = %outcome.describe(),
                    "No usable border found, returning original image"
                );
                Ok(BorderCrop {
                    image: image.clone(),
                    outcome,
                })
            }
        }
    }

    /// Runs detection without cropping.
    pub fn locate(&self, image: &RgbImage, range: &ColorRange) -> BorderOutcome {
        let mask = in_range_mask(image, range);
        let mask = close(&mask, Norm::LInf, 1);
        let mask = open(&mask, Norm::LInf, 1);

        // Contour tracing misses foreground on the image edge, so trace a
        // 1px zero frame around the mask and shift the points back.
        let contours: Vec<Contour<i32>> = find_contours::<i32>(&pad_mask(&mask))
            .into_iter()
            .map(|mut contour| {
                for p in &mut contour.points {
                    p.x -= 1;
                    p.y -= 1;
                }
                contour
            })
            .collect();
        let external: Vec<&Contour<i32>> = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .collect();

        if external.is_empty() {
            return BorderOutcome::NotFound;
        }

        let mut best: Option<(&Contour<i32>, f64)> = None;
        let mut largest_area = 0.0f64;
        for contour in external {
            let area = contour_area(contour);
            largest_area = largest_area.max(area);
            if area < self.min_area {
                continue;
            }
            // Strictly greater keeps the first contour on ties
            if best.is_none_or(|(_, best_area)| area > best_area) {
                best = Some((contour, area));
            }
        }

        let Some((contour, area)) = best else {
            return BorderOutcome::BelowMinArea { largest_area };
        };

        let bounds = bounding_rect(contour);
        let crop = bounds.expand(self.padding, image.dimensions());
        info!(
            x = bounds.x,
            y = bounds.y,
            width = bounds.width,
            height = bounds.height,
            area,
            "Border contour selected"
        );

        BorderOutcome::Detected { bounds, crop, area }
    }
}

/// Copies `mask` into the center of a zero image one pixel larger on every side.
fn pad_mask(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w + 2, h + 2, |x, y| {
        if x == 0 || y == 0 || x > w || y > h {
            Luma([0])
        } else {
            *mask.get_pixel(x - 1, y - 1)
        }
    })
}

/// Crops `image` to the largest contour of `color_name` with at least `min_area`.
pub fn crop_to_border(image: &RgbImage, color_name: &str, min_area: f64) -> Result<BorderCrop> {
    BorderDetector::new(min_area, BORDER_PADDING).crop(image, color_name)
}

/// Polygon area of a contour (shoelace formula over its boundary points).
pub fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }

    let mut twice_area: i64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }

    (twice_area as f64 / 2.0).abs()
}

/// Smallest axis-aligned rectangle containing every contour point.
pub fn bounding_rect(contour: &Contour<i32>) -> PixelRect {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;

    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    if contour.points.is_empty() {
        return PixelRect {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
    }

    PixelRect {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    }
}

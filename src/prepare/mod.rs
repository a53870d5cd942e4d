//! Form preparation: border crop followed by scaling to the canonical size.
//!
//! `prepare_form` is the entry point the rest of the application calls. It
//! never fails because a border is missing; the returned `BorderOutcome`
//! records whether the crop actually happened.

pub mod border;
pub mod color;
pub mod scale;

pub use border::{
    BORDER_PADDING, BorderCrop, BorderDetector, BorderOutcome, DEFAULT_MIN_BORDER_AREA, PixelRect,
    crop_to_border,
};
pub use color::{ColorRange, ColorRangeRegistry};
pub use scale::{DEFAULT_TARGET_SIZE, TargetSize, scale_image};

use std::path::Path;

use image::{ImageBuffer, Pixel, PixelWithColorType, RgbImage};
use tracing::{debug, info};

use crate::config::ScannerConfig;
use crate::error::{FormError, Result};

/// A form scaled to canonical size, plus how its border crop went.
#[derive(Clone, Debug)]
pub struct PreparedForm {
    pub image: RgbImage,
    pub border: BorderOutcome,
}

/// Loads an image file as 8-bit RGB.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).map_err(|source| FormError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), width = img.width(), height = img.height(), "Image loaded");
    Ok(img.to_rgb8())
}

/// Decodes an in-memory image (PNG, JPEG, TIFF, ...) as 8-bit RGB.
pub fn load_image_from_memory(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(|source| FormError::ImageLoad {
        path: "<memory>".into(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// Saves an image, format chosen by the file extension.
pub fn save_image<P>(image: &ImageBuffer<P, Vec<u8>>, path: &Path) -> Result<()>
where
    P: Pixel<Subpixel = u8> + PixelWithColorType,
{
    image.save(path).map_err(|source| FormError::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Image saved");
    Ok(())
}

/// Crop + scale pipeline with its settings.
#[derive(Clone, Debug)]
pub struct FormPreparer {
    pub target_size: TargetSize,
    pub border_color: String,
    pub detector: BorderDetector,
}

impl Default for FormPreparer {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            border_color: "blue".to_string(),
            detector: BorderDetector::default(),
        }
    }
}

impl FormPreparer {
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self {
            target_size: config.target_size(),
            border_color: config.border_color.clone(),
            detector: BorderDetector::new(config.min_border_area, config.border_padding),
        }
    }

    /// Crops `image` to its border and scales it to the target size.
    pub fn prepare(&self, image: &RgbImage) -> Result<PreparedForm> {
        // Reject unknown colors before doing any pixel work
        ColorRangeRegistry::global().lookup(&self.border_color)?;

        let BorderCrop { image: cropped, outcome } = self.detector.crop(image, &self.border_color)?;
        let prepared = scale_image(&cropped, self.target_size);

        info!(
            border = %outcome.describe(),
            width = prepared.width(),
            height = prepared.height(),
            "Form prepared"
        );

        Ok(PreparedForm {
            image: prepared,
            border: outcome,
        })
    }

    /// Loads `path` and prepares it.
    pub fn prepare_file(&self, path: &Path) -> Result<PreparedForm> {
        let image = load_image(path)?;
        self.prepare(&image)
    }
}

/// Crops `image` to its `border_color` frame and scales it to `target_size`.
pub fn prepare_form(image: &RgbImage, target_size: TargetSize, border_color: &str) -> Result<PreparedForm> {
    FormPreparer {
        target_size,
        border_color: border_color.to_string(),
        detector: BorderDetector::default(),
    }
    .prepare(image)
}

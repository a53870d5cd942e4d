//! Scanner configuration.
//!
//! Loads settings from config.json at startup. Every key is optional; missing
//! keys take the defaults below so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::enhance::{AdjustmentParameters, DEFAULT_THRESHOLD, NEUTRAL_SLIDER};
use crate::error::{FormError, Result};
use crate::prepare::{BORDER_PADDING, DEFAULT_MIN_BORDER_AREA, DEFAULT_TARGET_SIZE, TargetSize};

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<ScannerConfig> = OnceLock::new();

/// A rectangle in relative coordinates (0.0 to 1.0) of the prepared form.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of image width
    pub width: f32,
    /// Height as fraction of image height
    pub height: f32,
}

impl RelativeRect {
    /// Builds a relative rect from absolute corners measured on a `canvas` of (width, height).
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32, canvas: (u32, u32)) -> Self {
        let (w, h) = (canvas.0 as f32, canvas.1 as f32);
        Self {
            x: x1 as f32 / w,
            y: y1 as f32 / h,
            width: x2.saturating_sub(x1) as f32 / w,
            height: y2.saturating_sub(y1) as f32 / h,
        }
    }
}

/// Where to read one field from on the prepared form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldRegion {
    /// Field name as it appears in the extracted field map
    pub name: String,
    /// Region on the prepared form
    pub region: RelativeRect,
    /// Tesseract page segmentation mode for this field
    #[serde(default = "default_psm")]
    pub psm: u8,
}

fn default_psm() -> u8 {
    6
}

/// Where to look for the Medicare number that anchors the field layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Band of the prepared form searched for the number
    pub search_region: RelativeRect,
    /// Where the layout expects the number's top-left corner (relative x)
    pub expected_x: f32,
    /// Where the layout expects the number's top-left corner (relative y)
    pub expected_y: f32,
    /// Page segmentation mode for the search band (7 = single line)
    pub psm: u8,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        // The expected corner is the origin of the default medicare_number region
        Self {
            search_region: RelativeRect::from_corners(531, 0, 804, 80, LAYOUT_CANVAS),
            expected_x: 540.0 / LAYOUT_CANVAS.0 as f32,
            expected_y: 15.0 / LAYOUT_CANVAS.1 as f32,
            psm: 7,
        }
    }
}

/// Complete scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Width of the prepared form in pixels
    pub target_width: u32,
    /// Height of the prepared form in pixels
    pub target_height: u32,
    /// Name of the printed border color to crop to
    pub border_color: String,
    /// Smallest border contour area accepted, in square pixels
    pub min_border_area: f64,
    /// Pixels kept around the detected border
    pub border_padding: u32,
    /// Added to the saturation channel before equalization
    pub saturation_boost: u8,
    /// CLAHE clip limit used by the enhancement stage
    pub clahe_clip_limit: f32,
    /// Brightness slider (0-100, 50 neutral) applied to field regions before OCR
    pub brightness: u8,
    /// Contrast slider (0-100, 50 neutral) applied to field regions before OCR
    pub contrast: u8,
    /// Global threshold used to binarize field regions before OCR
    pub binarize_threshold: u8,
    /// Explicit path to the tesseract executable
    pub tesseract_path: Option<PathBuf>,
    /// Explicit tessdata directory
    pub tessdata_dir: Option<PathBuf>,
    /// Field regions read by the extractor
    pub field_regions: Vec<FieldRegion>,
    /// Medicare anchor search; `null` reads the fixed regions only
    pub anchor: Option<AnchorConfig>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_SIZE.width,
            target_height: DEFAULT_TARGET_SIZE.height,
            border_color: "blue".to_string(),
            min_border_area: DEFAULT_MIN_BORDER_AREA,
            border_padding: BORDER_PADDING,
            saturation_boost: 30,
            clahe_clip_limit: 2.0,
            brightness: NEUTRAL_SLIDER,
            contrast: NEUTRAL_SLIDER,
            binarize_threshold: DEFAULT_THRESHOLD,
            tesseract_path: None,
            tessdata_dir: None,
            field_regions: default_field_regions(),
            anchor: Some(AnchorConfig::default()),
        }
    }
}

impl ScannerConfig {
    pub fn target_size(&self) -> TargetSize {
        TargetSize::new(self.target_width, self.target_height)
    }

    /// Brightness, contrast and threshold applied to field regions.
    pub fn adjustment(&self) -> AdjustmentParameters {
        AdjustmentParameters {
            brightness: self.brightness,
            contrast: self.contrast,
            threshold: self.binarize_threshold,
        }
    }

    /// Stores tuner output as the new field region adjustment.
    pub fn set_adjustment(&mut self, params: AdjustmentParameters) {
        self.brightness = params.brightness;
        self.contrast = params.contrast;
        self.binarize_threshold = params.threshold;
    }

    /// Reads and parses a config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| FormError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| FormError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Size of the prepared image the default layout was measured on.
const LAYOUT_CANVAS: (u32, u32) = (1024, 768);

/// Field layout of the request form, measured on a 1024x768 prepared image.
pub fn default_field_regions() -> Vec<FieldRegion> {
    let region = |name: &str, corners: (u32, u32, u32, u32), psm: u8| FieldRegion {
        name: name.to_string(),
        region: RelativeRect::from_corners(corners.0, corners.1, corners.2, corners.3, LAYOUT_CANVAS),
        psm,
    };

    vec![
        region("request_number", (775, 30, 1006, 125), 6),
        region("medicare_number", (540, 15, 788, 98), 6),
        region("surname", (24, 96, 166, 151), 6),
        region("given_names", (280, 97, 470, 172), 6),
        region("date_of_birth", (655, 95, 788, 152), 6),
        region("sex", (617, 90, 657, 110), 10),
        region("address", (39, 145, 212, 213), 6),
        region("phone_number", (666, 149, 949, 292), 6),
        region("request_date", (694, 466, 894, 486), 6),
        region("doctor_information", (466, 538, 864, 684), 6),
    ]
}

/// Default location of config.json: next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path` or returns defaults.
pub fn load_config(path: &Path) -> ScannerConfig {
    info!("Looking for config at: {}", path.display());

    if !path.exists() {
        info!("config.json not found. Using default config.");
        return ScannerConfig::default();
    }

    match ScannerConfig::from_file(path) {
        Ok(config) => {
            info!("Config loaded from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Failed to load config: {}. Using defaults.", e);
            ScannerConfig::default()
        }
    }
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config(path: Option<&Path>) {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    let _ = CONFIG.set(load_config(&path));
}

/// Returns the global configuration, falling back to defaults if
/// `init_config` was never called.
pub fn get_config() -> &'static ScannerConfig {
    CONFIG.get_or_init(ScannerConfig::default)
}

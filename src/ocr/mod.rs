//! Text recognition boundary.
//!
//! The pipeline only needs `recognize(region) -> (text, confidence)`. The
//! `TextRecognizer` trait is that boundary; `TesseractRecognizer` is the
//! production implementation and tests substitute their own.

pub mod engine;
pub mod preprocess;

pub use engine::TesseractRecognizer;
pub use preprocess::{OCR_UPSCALE, crop_region, prepare_region, region_bounds};

use image::GrayImage;

use crate::error::Result;
use crate::prepare::PixelRect;

/// One recognized word and where it sits in the region.
#[derive(Clone, Debug, PartialEq)]
pub struct Word {
    pub text: String,
    pub confidence: f32,
    pub bounds: PixelRect,
}

/// Text read from one region.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// Mean word confidence, 0-100. 0 when nothing was read.
    pub confidence: f32,
    pub words: Vec<Word>,
}

/// Anything that can read text from a binarized field region.
pub trait TextRecognizer {
    /// Reads `region` using Tesseract page segmentation mode `psm`.
    fn recognize(&self, region: &GrayImage, psm: u8) -> Result<Recognition>;
}

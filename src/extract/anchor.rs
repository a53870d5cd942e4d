//! Medicare number anchoring.
//!
//! Scans are rarely placed identically, so after border cropping the fields
//! can still sit a few pixels off the fixed layout. The Medicare number is
//! printed in a fixed band at the top of the form; where it is actually found
//! gives the offset applied to every other region.

use std::sync::LazyLock;

use image::imageops::FilterType;
use image::{ImageBuffer, Pixel};
use imageproc::contrast::otsu_level;
use regex::Regex;
use tracing::debug;

use super::clean_text;
use crate::config::{AnchorConfig, FieldRegion, RelativeRect};
use crate::enhance::binarize;
use crate::error::Result;
use crate::ocr::{OCR_UPSCALE, TextRecognizer, Word, region_bounds};

/// Field the anchor is read into.
pub const MEDICARE_FIELD: &str = "medicare_number";

/// Ten digits, a slash and the position on the card.
static MEDICARE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}/[0-9]$").ok());

/// A Medicare number found on the form.
#[derive(Clone, Debug, PartialEq)]
pub struct MedicareAnchor {
    /// Cleaned number as "NNNNNNNNNN/P"
    pub text: String,
    pub confidence: f32,
    /// Where the number was read, relative to the whole form
    pub bounds: RelativeRect,
}

/// Reads the anchor band and returns the most confident word shaped like a
/// Medicare number, or `None` when the band holds none.
pub fn find_medicare_anchor<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    config: &AnchorConfig,
    recognizer: &dyn TextRecognizer,
) -> Result<Option<MedicareAnchor>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (img_w, img_h) = image.dimensions();
    let band = region_bounds((img_w, img_h), &config.search_region);
    if band.width == 0 || band.height == 0 {
        return Ok(None);
    }

    let cropped = image::imageops::crop_imm(image, band.x, band.y, band.width, band.height).to_image();
    let gray = image::imageops::grayscale(&cropped);
    let enlarged = image::imageops::resize(
        &gray,
        gray.width() * OCR_UPSCALE,
        gray.height() * OCR_UPSCALE,
        FilterType::CatmullRom,
    );
    // Pixels above the Otsu level are background
    let level = otsu_level(&enlarged);
    let binary = binarize(&enlarged, level.saturating_add(1));

    let recognition = recognizer.recognize(&binary, config.psm)?;
    let Some(pattern) = MEDICARE_PATTERN.as_ref() else {
        return Ok(None);
    };

    let mut best: Option<(String, f32, &Word)> = None;
    for word in &recognition.words {
        let cleaned = clean_text(MEDICARE_FIELD, &word.text);
        if !pattern.is_match(&cleaned) {
            continue;
        }
        // Strictly greater keeps the first word on ties
        if best.as_ref().is_none_or(|(_, conf, _)| word.confidence > *conf) {
            best = Some((cleaned, word.confidence, word));
        }
    }

    let Some((text, confidence, word)) = best else {
        debug!(text = %recognition.text, "No Medicare number in anchor band");
        return Ok(None);
    };

    let to_form = |offset: u32, scaled: u32| (offset + scaled / OCR_UPSCALE) as f32;
    let bounds = RelativeRect {
        x: to_form(band.x, word.bounds.x) / img_w as f32,
        y: to_form(band.y, word.bounds.y) / img_h as f32,
        width: (word.bounds.width / OCR_UPSCALE) as f32 / img_w as f32,
        height: (word.bounds.height / OCR_UPSCALE) as f32 / img_h as f32,
    };
    debug!(%text, confidence, x = bounds.x, y = bounds.y, "Medicare anchor found");

    Ok(Some(MedicareAnchor {
        text,
        confidence,
        bounds,
    }))
}

/// Moves every region except the Medicare number by the distance between
/// where the anchor was found and where the layout expects it.
pub fn shift_regions(
    regions: &[FieldRegion],
    config: &AnchorConfig,
    anchor: &MedicareAnchor,
) -> Vec<FieldRegion> {
    let dx = anchor.bounds.x - config.expected_x;
    let dy = anchor.bounds.y - config.expected_y;

    regions
        .iter()
        .filter(|field| field.name != MEDICARE_FIELD)
        .map(|field| {
            let mut shifted = field.clone();
            shifted.region.x += dx;
            shifted.region.y += dy;
            shifted
        })
        .collect()
}

//! Field extraction from a prepared form.
//!
//! Each configured region is cropped, binarized, read by the recognizer and
//! cleaned. `derive_fields` then fills in the values that are computed from
//! other fields rather than read directly.

pub mod anchor;
pub mod cleanup;

pub use anchor::{MEDICARE_FIELD, MedicareAnchor, find_medicare_anchor, shift_regions};
pub use cleanup::{
    AddressParts, PhoneNumbers, clean_text, derive_provider_number, split_address, split_medicare,
    split_phone_numbers,
};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use image::{ImageBuffer, Pixel};
use tracing::{debug, warn};

use crate::config::{AnchorConfig, FieldRegion};
use crate::enhance::AdjustmentParameters;
use crate::error::Result;
use crate::ocr::{TextRecognizer, prepare_region};
use crate::validate::FieldMap;

/// Date format used on the form and in stored records.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Confidence given to values the scanner generated itself.
pub const GENERATED_CONFIDENCE: f32 = 100.0;

/// Text read from a form, with per-field and overall confidence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    pub fields: FieldMap,
    pub confidences: BTreeMap<String, f32>,
    /// Mean confidence over the regions that were read.
    pub confidence: f32,
    /// Set when the layout was shifted to a Medicare number found on the form.
    pub anchor: Option<MedicareAnchor>,
}

impl Extraction {
    fn set(&mut self, name: &str, value: String, confidence: f32) {
        self.fields.insert(name.to_string(), value);
        self.confidences.insert(name.to_string(), confidence);
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn confidence_of(&self, name: &str) -> f32 {
        self.confidences.get(name).copied().unwrap_or(0.0)
    }

    fn update_confidence(&mut self) {
        if !self.confidences.is_empty() {
            let total: f32 = self.confidences.values().sum();
            self.confidence = total / self.confidences.len() as f32;
        }
    }
}

/// Reads every region of `image` with `recognizer`.
pub fn extract_fields<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    regions: &[FieldRegion],
    params: &AdjustmentParameters,
    recognizer: &dyn TextRecognizer,
) -> Result<Extraction>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut extraction = Extraction::default();

    for field in regions {
        let region = prepare_region(image, &field.region, params);
        let recognition = recognizer.recognize(&region, field.psm)?;
        let cleaned = clean_text(&field.name, &recognition.text);

        debug!(
            field = %field.name,
            raw = %recognition.text,
            cleaned = %cleaned,
            confidence = recognition.confidence,
            "Field read"
        );
        extraction.set(&field.name, cleaned, recognition.confidence);
    }

    extraction.update_confidence();
    Ok(extraction)
}

/// Like `extract_fields`, but first looks for the Medicare number and moves
/// the other regions by its offset from the layout. The found number is used
/// as the `medicare_number` value. Without an anchor the fixed regions are read.
pub fn extract_fields_with_anchor<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    regions: &[FieldRegion],
    anchor_config: &AnchorConfig,
    params: &AdjustmentParameters,
    recognizer: &dyn TextRecognizer,
) -> Result<Extraction>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let Some(anchor) = find_medicare_anchor(image, anchor_config, recognizer)? else {
        warn!("Medicare number not found in anchor band, reading fixed regions");
        return extract_fields(image, regions, params, recognizer);
    };

    let shifted = shift_regions(regions, anchor_config, &anchor);
    let mut extraction = extract_fields(image, &shifted, params, recognizer)?;
    extraction.set(MEDICARE_FIELD, anchor.text.clone(), anchor.confidence);
    extraction.update_confidence();
    extraction.anchor = Some(anchor);
    Ok(extraction)
}

/// Fills in fields computed from the ones read off the form.
///
/// - `medicare_number` "NNNNNNNNNN/P" becomes the number plus `medicare_position`
/// - `phone_number` splits into `home_phone_number` and `mobile_phone_number`
/// - `address` splits into street `address`, `suburb`, `postcode` and `state`
/// - `provider_number` is taken from the tail of `doctor_information`
/// - `name` joins given names and surname
/// - `received_date` is `today`
///
/// The overall confidence is left as computed from the regions read.
pub fn derive_fields(extraction: &mut Extraction, today: NaiveDate) {
    if let Some((number, position)) = extraction.value("medicare_number").and_then(split_medicare) {
        let conf = extraction.confidence_of("medicare_number");
        extraction.set("medicare_number", number, conf);
        extraction.set("medicare_position", position, conf);
    }

    if let Some(field) = extraction.value("phone_number").map(str::to_string) {
        let conf = extraction.confidence_of("phone_number");
        let phones = split_phone_numbers(&field);
        if let Some(home) = phones.home {
            extraction.set("home_phone_number", home, conf);
        }
        if let Some(mobile) = phones.mobile {
            extraction.set("mobile_phone_number", mobile, conf);
        }
    }

    if let Some(full) = extraction.value("address").map(str::to_string) {
        let conf = extraction.confidence_of("address");
        let parts = split_address(&full);
        extraction.set("address", parts.address, conf);
        for (name, value) in [("suburb", parts.suburb), ("postcode", parts.postcode), ("state", parts.state)] {
            if let Some(value) = value {
                extraction.set(name, value, conf);
            }
        }
    }

    let provider_source = ["provider_number", "doctor_information"]
        .into_iter()
        .find_map(|name| extraction.value(name).map(|v| (name, v.to_string())));
    if let Some((source, value)) = provider_source {
        if let Some(provider) = derive_provider_number(&value) {
            let conf = extraction.confidence_of(source);
            extraction.set("provider_number", provider, conf);
        }
    }

    let full_name = match (extraction.value("given_names"), extraction.value("surname")) {
        (Some(given), Some(surname)) => Some(format!("{} {}", given, surname)),
        _ => None,
    };
    if let Some(name) = full_name {
        let conf = (extraction.confidence_of("given_names") + extraction.confidence_of("surname")) / 2.0;
        extraction.set("name", name, conf);
    }

    extraction.set(
        "received_date",
        today.format(DATE_FORMAT).to_string(),
        GENERATED_CONFIDENCE,
    );
}

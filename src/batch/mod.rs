//! Single-form and folder processing.
//!
//! `process_form` runs the whole pipeline on one file: load, crop and scale,
//! enhance, read fields, derive, validate. `process_folder` repeats it for
//! every image in a directory. A failing file is logged and counted, never
//! fatal to the batch.

pub mod record;

pub use record::{CsvRecordSink, FormRecord, LOW_CONFIDENCE_THRESHOLD, RecordSink};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use tracing::{info, warn};

use crate::config::ScannerConfig;
use crate::enhance::enhance;
use crate::error::{FailureKind, FormError, Result};
use crate::extract::{derive_fields, extract_fields, extract_fields_with_anchor};
use crate::ocr::TextRecognizer;
use crate::prepare::FormPreparer;
use crate::validate::validate_data;

/// Image extensions picked up from a folder, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];

/// Outcome of a folder run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total_images: usize,
    pub records_added: usize,
    /// Files that could not be turned into a record, by cause.
    pub failures: BTreeMap<FailureKind, usize>,
    /// Records stored but flagged for operator review.
    pub needs_review: usize,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

/// Runs the full pipeline on the image at `path`.
pub fn process_form(path: &Path, config: &ScannerConfig, recognizer: &dyn TextRecognizer) -> Result<FormRecord> {
    let prepared = FormPreparer::from_config(config).prepare_file(path)?;
    let enhanced = enhance(&prepared.image, config.saturation_boost, config.clahe_clip_limit);

    let params = config.adjustment();
    let mut extraction = match &config.anchor {
        Some(anchor) => {
            extract_fields_with_anchor(&enhanced, &config.field_regions, anchor, &params, recognizer)?
        }
        None => extract_fields(&enhanced, &config.field_regions, &params, recognizer)?,
    };
    let processed_at = Local::now();
    derive_fields(&mut extraction, processed_at.date_naive());

    let validation = validate_data(&extraction.fields);
    if !validation.is_valid() {
        warn!(path = %path.display(), errors = %validation.summary(), "Validation failed");
    }

    Ok(FormRecord {
        source_path: path.to_path_buf(),
        fields: extraction.fields,
        confidence: extraction.confidence,
        validation,
        border: prepared.border,
        processed_at,
    })
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Image files directly inside `folder`, sorted by path.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Processes every image in `folder`, storing each record in `sink`.
///
/// `progress` receives a 0-100 percentage after each file. Only a folder
/// that cannot be listed or a sink that cannot be written aborts the run.
pub fn process_folder(
    folder: &Path,
    config: &ScannerConfig,
    recognizer: &dyn TextRecognizer,
    sink: &mut dyn RecordSink,
    mut progress: Option<&mut dyn FnMut(u8)>,
) -> anyhow::Result<BatchSummary> {
    let images = list_images(folder).with_context(|| format!("Failed to list {}", folder.display()))?;
    let mut summary = BatchSummary {
        total_images: images.len(),
        ..Default::default()
    };

    info!(folder = %folder.display(), total = images.len(), "Batch started");

    for (index, path) in images.iter().enumerate() {
        match process_form(path, config, recognizer) {
            Ok(record) => {
                sink.store(&record)
                    .with_context(|| format!("Failed to store record for {}", path.display()))?;
                summary.records_added += 1;
                if record.needs_review() {
                    summary.needs_review += 1;
                }
                info!(
                    path = %path.display(),
                    confidence = record.confidence,
                    border = %record.border.describe(),
                    "Form processed"
                );
            }
            Err(e) => {
                record_failure(&mut summary, path, &e);
            }
        }

        if let Some(report) = progress.as_deref_mut() {
            report(((index + 1) * 100 / images.len()) as u8);
        }
    }

    info!(
        total = summary.total_images,
        added = summary.records_added,
        failed = summary.failed(),
        needs_review = summary.needs_review,
        "Batch finished"
    );
    Ok(summary)
}

fn record_failure(summary: &mut BatchSummary, path: &Path, error: &FormError) {
    let kind = error.kind();
    warn!(path = %path.display(), kind = kind.label(), "Skipping form: {}", error);
    *summary.failures.entry(kind).or_insert(0) += 1;
}

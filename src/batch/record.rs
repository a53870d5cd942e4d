//! Processed form records and where they go.
//!
//! `CsvRecordSink` writes one row per form in append-only mode for crash
//! safety: a batch that dies halfway keeps every row written before it.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::prepare::BorderOutcome;
use crate::validate::{FieldMap, ValidationResult};

/// Records below this overall OCR confidence are flagged for review.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 70.0;

/// Field columns of the record file, in order.
pub const RECORD_FIELDS: &[&str] = &[
    "request_number",
    "request_date",
    "received_date",
    "given_names",
    "surname",
    "name",
    "sex",
    "date_of_birth",
    "medicare_number",
    "medicare_position",
    "home_phone_number",
    "mobile_phone_number",
    "address",
    "suburb",
    "postcode",
    "state",
    "doctor_information",
    "provider_number",
];

/// Everything known about one processed form.
#[derive(Clone, Debug)]
pub struct FormRecord {
    pub source_path: PathBuf,
    pub fields: FieldMap,
    /// Mean OCR confidence, 0-100
    pub confidence: f32,
    pub validation: ValidationResult,
    pub border: BorderOutcome,
    pub processed_at: DateTime<Local>,
}

impl FormRecord {
    /// True when an operator should look at this form before it is trusted.
    pub fn needs_review(&self) -> bool {
        !self.validation.is_valid() || !self.border.is_detected() || self.confidence < LOW_CONFIDENCE_THRESHOLD
    }
}

/// Destination for processed records.
pub trait RecordSink {
    fn store(&mut self, record: &FormRecord) -> Result<()>;
}

/// Keeps records in memory.
impl RecordSink for Vec<FormRecord> {
    fn store(&mut self, record: &FormRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Header row: timestamp and source, the field columns, then review data.
pub fn csv_header() -> String {
    let mut columns = vec!["processed_at", "source_path"];
    columns.extend_from_slice(RECORD_FIELDS);
    columns.extend_from_slice(&["confidence", "border_detected", "needs_review", "validation_errors"]);
    columns.join(",")
}

/// Quotes a value if it contains a separator, quote or line break.
fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Formats `record` as one CSV row matching `csv_header`.
pub fn csv_row(record: &FormRecord) -> String {
    let mut cells = vec![
        record.processed_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        escape_csv(&record.source_path.display().to_string()),
    ];
    cells.extend(
        RECORD_FIELDS
            .iter()
            .map(|name| escape_csv(record.fields.get(*name).map(String::as_str).unwrap_or(""))),
    );
    cells.push(format!("{:.2}", record.confidence));
    cells.push(record.border.is_detected().to_string());
    cells.push(record.needs_review().to_string());
    cells.push(escape_csv(&record.validation.summary()));
    cells.join(",")
}

/// Appends records to a CSV file.
#[derive(Debug)]
pub struct CsvRecordSink {
    path: PathBuf,
}

impl CsvRecordSink {
    /// Opens `path`, writing the header if the file is new or empty.
    ///
    /// An existing file with content is left untouched.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        init_csv(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvRecordSink {
    /// Opens the file in append mode for each write.
    fn store(&mut self, record: &FormRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open CSV for append")?;

        writeln!(file, "{}", csv_row(record)).context("Failed to write CSV row")?;
        Ok(())
    }
}

fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create CSV file")?;
    writeln!(file, "{}", csv_header()).context("Failed to write CSV header")?;
    Ok(())
}

//! Request form scanner.
//!
//! Finds the printed form on a scanned page, normalizes it, reads its fields
//! through an OCR engine, and validates the results before they are stored.
//!
//! Pipeline: `prepare` (border crop and scale) -> `enhance` (CLAHE) ->
//! `extract` (OCR per field region) -> `validate` -> `batch` (record sink).

pub mod batch;
pub mod config;
pub mod enhance;
pub mod error;
pub mod extract;
pub mod logging;
pub mod ocr;
pub mod paths;
pub mod prepare;
pub mod tuner;
pub mod validate;

pub use error::{FailureKind, FormError, Result};
pub use prepare::{PreparedForm, TargetSize, prepare_form};
pub use validate::{FieldMap, ValidationResult, validate_data, validate_field};

//! Error types for the form pipeline.
//!
//! Only unrecoverable conditions live here. A missing border is reported
//! through `BorderOutcome` and failed field checks through
//! `ValidationResult`; neither is an error.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort processing of a single form.
#[derive(Error, Debug)]
pub enum FormError {
    /// The image file is missing or could not be decoded.
    #[error("Could not load image at {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The image could not be written to disk.
    #[error("Could not save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The requested border color has no entry in the color registry.
    #[error("Unsupported border color '{name}'. Supported colors: {supported:?}")]
    UnsupportedColor { name: String, supported: Vec<String> },

    /// The OCR collaborator failed to produce text for a region.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// Configuration could not be read or parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse failure categories so batch callers can count by cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    ImageLoad,
    ImageSave,
    UnsupportedColor,
    Ocr,
    Config,
    Io,
}

impl FormError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ImageLoad { .. } => FailureKind::ImageLoad,
            Self::ImageSave { .. } => FailureKind::ImageSave,
            Self::UnsupportedColor { .. } => FailureKind::UnsupportedColor,
            Self::Ocr(_) => FailureKind::Ocr,
            Self::Config(_) => FailureKind::Config,
            Self::Io(_) => FailureKind::Io,
        }
    }
}

impl FailureKind {
    /// Short label used in batch summaries and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ImageLoad => "image_load",
            Self::ImageSave => "image_save",
            Self::UnsupportedColor => "unsupported_color",
            Self::Ocr => "ocr",
            Self::Config => "config",
            Self::Io => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_color_message_lists_known_colors() {
        let err = FormError::UnsupportedColor {
            name: "green".to_string(),
            supported: vec!["black".to_string(), "blue".to_string()],
        };

        let msg = err.to_string();
        assert!(msg.contains("green"));
        assert!(msg.contains("blue"));
        assert_eq!(err.kind(), FailureKind::UnsupportedColor);
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FormError = io.into();
        assert_eq!(err.kind(), FailureKind::Io);
        assert_eq!(err.kind().label(), "io");
    }
}

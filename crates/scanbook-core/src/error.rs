// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanbook.

use thiserror::Error;

/// Top-level error type for all Scanbook operations.
#[derive(Debug, Error)]
pub enum ScanbookError {
    // -- Preconditions --
    #[error("invalid input file: {0}")]
    InvalidInput(String),

    #[error("recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    // -- Per-file processing --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("processing timed out after {0} s")]
    Timeout(u64),

    #[error("worker failed: {0}")]
    Worker(String),

    // -- Corpus assembly --
    #[error("book assembly failed: {0}")]
    Assembly(String),

    // -- Configuration --
    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanbookError {
    /// Whether the error belongs to a single input file.
    ///
    /// Engine, configuration, and assembly errors describe the pipeline
    /// itself: they stop a run when raised at startup or assembly, and are
    /// flagged as such when a conversion hits one.
    pub fn is_per_file(&self) -> bool {
        match self {
            Self::InvalidInput(_)
            | Self::ImageError(_)
            | Self::PdfError(_)
            | Self::OcrError(_)
            | Self::Timeout(_)
            | Self::Worker(_)
            | Self::Io(_)
            | Self::Serialization(_) => true,
            Self::EngineUnavailable(_) | Self::Assembly(_) | Self::Config(_) => false,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_classification() {
        assert!(ScanbookError::OcrError("garbled".into()).is_per_file());
        assert!(ScanbookError::Timeout(30).is_per_file());
        assert!(
            ScanbookError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
                .is_per_file()
        );
        assert!(!ScanbookError::EngineUnavailable("tesseract".into()).is_per_file());
        assert!(!ScanbookError::Assembly("disk full".into()).is_per_file());
    }

    #[test]
    fn messages_carry_the_reason() {
        let err = ScanbookError::InvalidInput("scan.docx: unsupported extension".into());
        assert_eq!(
            err.to_string(),
            "invalid input file: scan.docx: unsupported extension"
        );
        assert_eq!(ScanbookError::Timeout(5).to_string(), "processing timed out after 5 s");
    }
}

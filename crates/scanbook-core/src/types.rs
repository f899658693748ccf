// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanbook conversion pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File extensions accepted as scanned input, lower-case, without the dot.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tiff", "pdf"];

/// Supported scanned page formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageFormat {
    Jpeg,
    Png,
    Tiff,
    /// Multi-page document, rasterised page by page before recognition.
    Pdf,
}

impl PageFormat {
    /// Infer the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tiff" => Some(Self::Tiff),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// Outcome of running one input file through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionStatus {
    Success {
        /// Rendered markdown for this input.
        markdown: PathBuf,
        /// Enhanced page images kept for debugging (empty when disabled).
        enhanced_images: Vec<PathBuf>,
    },
    Failure {
        reason: String,
    },
}

/// Self-describing per-file result. Carries its source path and discovery
/// position so results can be reordered regardless of completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Position of the input in discovery order.
    pub sequence: usize,
    pub input: PathBuf,
    #[serde(flatten)]
    pub status: ConversionStatus,
}

impl ConversionResult {
    pub fn success(sequence: usize, input: PathBuf, markdown: PathBuf, enhanced_images: Vec<PathBuf>) -> Self {
        Self {
            sequence,
            input,
            status: ConversionStatus::Success {
                markdown,
                enhanced_images,
            },
        }
    }

    pub fn failure(sequence: usize, input: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            sequence,
            input,
            status: ConversionStatus::Failure {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ConversionStatus::Success { .. })
    }

    /// Markdown path for successful results.
    pub fn markdown(&self) -> Option<&Path> {
        match &self.status {
            ConversionStatus::Success { markdown, .. } => Some(markdown),
            ConversionStatus::Failure { .. } => None,
        }
    }

    /// Failure reason for failed results.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            ConversionStatus::Success { .. } => None,
            ConversionStatus::Failure { reason } => Some(reason),
        }
    }
}

/// One failed input and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub input: PathBuf,
    pub reason: String,
}

/// Summary of a batch run, shown to the user and persisted next to the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
    /// Root of the assembled corpus, once assembly has run.
    pub book_dir: Option<PathBuf>,
}

impl BatchReport {
    /// Tally `results`. Failures are listed in discovery order.
    pub fn from_results(results: &[ConversionResult], started_at: DateTime<Utc>) -> Self {
        let mut failures: Vec<(usize, FailureRecord)> = results
            .iter()
            .filter_map(|result| {
                result.failure_reason().map(|reason| {
                    (
                        result.sequence,
                        FailureRecord {
                            input: result.input.clone(),
                            reason: reason.to_owned(),
                        },
                    )
                })
            })
            .collect();
        failures.sort_by_key(|(sequence, _)| *sequence);

        let failed = failures.len();
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            total: results.len(),
            succeeded: results.len() - failed,
            failed,
            failures: failures.into_iter().map(|(_, record)| record).collect(),
            book_dir: None,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

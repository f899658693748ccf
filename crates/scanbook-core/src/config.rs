// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration: built-in defaults, optional JSON file, then
// environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanbookError};

/// Default upper bound on an input file (50 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Tunables consumed by the conversion pipeline.
///
/// Keys in a JSON config file may use either the field names below or the
/// upper-case environment names (`OCR_LANGUAGE`, `BOOK_TITLE`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Recognition language profile (Tesseract language code).
    #[serde(alias = "OCR_LANGUAGE")]
    pub ocr_language: String,
    /// Rasterisation resolution for PDF pages.
    #[serde(alias = "OCR_DPI")]
    pub ocr_dpi: u32,
    /// Size of the batch worker pool.
    #[serde(alias = "OCR_THREADS")]
    pub ocr_threads: usize,
    /// Per-file processing deadline in seconds; `0` disables it.
    #[serde(alias = "OCR_TIMEOUT_SECS")]
    pub ocr_timeout_secs: u64,
    /// Inputs larger than this are rejected before decoding.
    #[serde(alias = "MAX_FILE_BYTES")]
    pub max_file_bytes: u64,
    /// Keep a copy of every enhanced page image for debugging.
    #[serde(alias = "SAVE_PROCESSED_IMAGES")]
    pub save_processed_images: bool,
    /// Where enhanced page images are written.
    #[serde(alias = "OUTPUT_DIR")]
    pub processed_image_dir: PathBuf,
    /// Where per-file markdown is written before assembly.
    #[serde(alias = "MD_OUTPUT_DIR")]
    pub markdown_output_dir: PathBuf,
    /// Parent directory of the assembled book.
    #[serde(alias = "MDBOOK_OUTPUT_DIR")]
    pub book_output_dir: PathBuf,
    #[serde(alias = "BOOK_TITLE")]
    pub book_title: String,
    #[serde(alias = "BOOK_AUTHOR")]
    pub book_author: String,
    #[serde(alias = "BOOK_DESCRIPTION")]
    pub book_description: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ocr_language: "eng".into(),
            ocr_dpi: 300,
            ocr_threads: 4,
            ocr_timeout_secs: 300,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            save_processed_images: true,
            processed_image_dir: PathBuf::from("./processed_images"),
            markdown_output_dir: PathBuf::from("./markdown_output"),
            book_output_dir: PathBuf::from("./mdbook_output"),
            book_title: "Art History Textbook".into(),
            book_author: "Lucas Blanco".into(),
            book_description: "Complete online textbook for ARH1000".into(),
        }
    }
}

/// Book-level metadata written into the corpus description file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub description: String,
}

impl PipelineConfig {
    /// Load defaults, merge the JSON file at `path` (if given), then apply
    /// process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ScanbookError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            ScanbookError::Config(format!("cannot parse {}: {}", path.display(), err))
        })
    }

    /// Apply `KEY=value` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("OCR_LANGUAGE") {
            self.ocr_language = value;
        }
        if let Some(value) = get("OCR_DPI") {
            self.ocr_dpi = parse_number("OCR_DPI", &value)?;
        }
        if let Some(value) = get("OCR_THREADS") {
            self.ocr_threads = parse_number("OCR_THREADS", &value)?;
        }
        if let Some(value) = get("OCR_TIMEOUT_SECS") {
            self.ocr_timeout_secs = parse_number("OCR_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("MAX_FILE_BYTES") {
            self.max_file_bytes = parse_number("MAX_FILE_BYTES", &value)?;
        }
        if let Some(value) = get("SAVE_PROCESSED_IMAGES") {
            self.save_processed_images = parse_flag("SAVE_PROCESSED_IMAGES", &value)?;
        }
        if let Some(value) = get("OUTPUT_DIR") {
            self.processed_image_dir = PathBuf::from(value);
        }
        if let Some(value) = get("MD_OUTPUT_DIR") {
            self.markdown_output_dir = PathBuf::from(value);
        }
        if let Some(value) = get("MDBOOK_OUTPUT_DIR") {
            self.book_output_dir = PathBuf::from(value);
        }
        if let Some(value) = get("BOOK_TITLE") {
            self.book_title = value;
        }
        if let Some(value) = get("BOOK_AUTHOR") {
            self.book_author = value;
        }
        if let Some(value) = get("BOOK_DESCRIPTION") {
            self.book_description = value;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ocr_language.trim().is_empty() {
            return Err(ScanbookError::Config("ocr_language must not be empty".into()));
        }
        if self.ocr_dpi == 0 {
            return Err(ScanbookError::Config("ocr_dpi must be positive".into()));
        }
        if self.max_file_bytes == 0 {
            return Err(ScanbookError::Config("max_file_bytes must be positive".into()));
        }
        Ok(())
    }

    /// Number of batch workers; never zero.
    pub fn worker_count(&self) -> usize {
        self.ocr_threads.max(1)
    }

    /// Per-file deadline, or `None` when disabled.
    pub fn per_file_timeout(&self) -> Option<Duration> {
        (self.ocr_timeout_secs > 0).then(|| Duration::from_secs(self.ocr_timeout_secs))
    }

    pub fn book(&self) -> BookMetadata {
        BookMetadata {
            title: self.book_title.clone(),
            author: self.book_author.clone(),
            description: self.book_description.clone(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScanbookError::Config(format!("{key}: expected a number, got {value:?}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ScanbookError::Config(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.ocr_language, "eng");
        assert_eq!(config.ocr_dpi, 300);
        assert_eq!(config.ocr_threads, 4);
        assert_eq!(config.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(config.book_title, "Art History Textbook");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_win() {
        let mut config = PipelineConfig::default();
        config
            .apply_overrides(lookup(&[
                ("OCR_LANGUAGE", "deu"),
                ("OCR_THREADS", "8"),
                ("BOOK_TITLE", "Sculpture"),
                ("MD_OUTPUT_DIR", "/tmp/md"),
                ("OCR_DPI", ""),
            ]))
            .unwrap();
        assert_eq!(config.ocr_language, "deu");
        assert_eq!(config.ocr_threads, 8);
        assert_eq!(config.book_title, "Sculpture");
        assert_eq!(config.markdown_output_dir, PathBuf::from("/tmp/md"));
        // Empty values are ignored.
        assert_eq!(config.ocr_dpi, 300);
    }

    #[test]
    fn malformed_number_is_a_config_error() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_overrides(lookup(&[("OCR_DPI", "three hundred")]))
            .unwrap_err();
        assert!(matches!(err, ScanbookError::Config(_)));
    }

    #[test]
    fn file_accepts_upper_case_keys_and_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"OCR_DPI": 150, "book_author": "A. Curator"}"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.ocr_dpi, 150);
        assert_eq!(config.book_author, "A. Curator");
        assert_eq!(config.ocr_language, "eng");
    }

    #[test]
    fn unreadable_file_is_reported() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/scanbook.json")).unwrap_err();
        assert!(matches!(err, ScanbookError::Config(_)));
    }

    #[test]
    fn worker_count_and_timeout() {
        let mut config = PipelineConfig {
            ocr_threads: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.worker_count(), 1);
        assert_eq!(config.per_file_timeout(), Some(Duration::from_secs(300)));
        config.ocr_timeout_secs = 0;
        assert_eq!(config.per_file_timeout(), None);
    }

    #[test]
    fn zero_dpi_rejected() {
        let config = PipelineConfig {
            ocr_dpi: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

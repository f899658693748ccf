// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input validation, the fail-closed precondition check every other
// operation relies on, and the decoded page model.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use scanbook_core::config::DEFAULT_MAX_FILE_BYTES;
use scanbook_core::error::{Result, ScanbookError};
use scanbook_core::types::{ALLOWED_EXTENSIONS, PageFormat};
use tracing::{debug, warn};

use crate::image::processor::ImageProcessor;

/// Checks untrusted input files against the extension allow-list and the
/// size ceiling.
#[derive(Debug, Clone, Copy)]
pub struct FileValidator {
    max_file_bytes: u64,
}

/// A file that passed [`FileValidator::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    pub path: PathBuf,
    pub format: PageFormat,
    pub byte_size: u64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl FileValidator {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// `true` when `path` may be processed. Never errors: any problem,
    /// including an unreadable path, is a rejection.
    pub fn validate(&self, path: &Path) -> bool {
        match self.check(path) {
            Ok(_) => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Rejected input file");
                false
            }
        }
    }

    /// Like [`validate`](Self::validate), but returns the reason for a
    /// rejection as [`ScanbookError::InvalidInput`].
    pub fn check(&self, path: &Path) -> Result<ValidatedInput> {
        let metadata = std::fs::metadata(path).map_err(|_| {
            ScanbookError::InvalidInput(format!("{}: file does not exist", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(ScanbookError::InvalidInput(format!(
                "{}: not a regular file",
                path.display()
            )));
        }

        let format = PageFormat::from_path(path).ok_or_else(|| {
            let ext = path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            ScanbookError::InvalidInput(format!(
                "{}: unsupported extension {:?} (allowed: {})",
                path.display(),
                ext,
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

        let byte_size = metadata.len();
        if byte_size > self.max_file_bytes {
            return Err(ScanbookError::InvalidInput(format!(
                "{}: file too large ({} bytes, limit {})",
                path.display(),
                byte_size,
                self.max_file_bytes
            )));
        }

        debug!(path = %path.display(), ?format, byte_size, "Input file accepted");
        Ok(ValidatedInput {
            path: path.to_path_buf(),
            format,
            byte_size,
        })
    }
}

/// A single scanned page held in memory.
///
/// Raster inputs produce one page; PDF inputs produce one page per
/// rasterised PDF page, tagged with its 1-based page number and DPI.
pub struct PageImage {
    pub source: PathBuf,
    pub format: PageFormat,
    pub byte_size: u64,
    /// 1-based page number inside a multi-page source.
    pub page: Option<u32>,
    /// Rasterisation resolution, when known.
    pub dpi: Option<u32>,
    pub image: DynamicImage,
}

impl PageImage {
    /// Decode a validated raster input.
    pub fn load(input: &ValidatedInput) -> Result<Self> {
        if !input.format.is_raster() {
            return Err(ScanbookError::InvalidInput(format!(
                "{}: PDF input must be rasterised page by page",
                input.path.display()
            )));
        }
        let image = ImageProcessor::open(&input.path)?.into_dynamic();
        Ok(Self {
            source: input.path.clone(),
            format: input.format,
            byte_size: input.byte_size,
            page: None,
            dpi: None,
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, len: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_len(len).unwrap();
        path
    }

    #[test]
    fn oversized_jpeg_is_rejected_regardless_of_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "huge.jpg", 60 * 1024 * 1024);
        let validator = FileValidator::default();
        assert!(!validator.validate(&path));
        let err = validator.check(&path).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn docx_is_rejected_regardless_of_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "notes.docx", 10);
        assert!(!FileValidator::default().validate(&path));
    }

    #[test]
    fn missing_file_is_rejected_without_error() {
        assert!(!FileValidator::default().validate(Path::new("/nonexistent/page.png")));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("scans.png");
        std::fs::create_dir(&sub).unwrap();
        assert!(!FileValidator::default().validate(&sub));
    }

    #[test]
    fn allowed_file_within_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Page_01.PNG");
        File::create(&path).unwrap().write_all(b"stub").unwrap();

        let checked = FileValidator::default().check(&path).unwrap();
        assert_eq!(checked.format, PageFormat::Png);
        assert_eq!(checked.byte_size, 4);
    }

    #[test]
    fn limit_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "edge.tiff", 1024);
        assert!(FileValidator::new(1024).validate(&path));
        assert!(!FileValidator::new(1023).validate(&path));
    }

    #[test]
    fn load_refuses_pdf() {
        let input = ValidatedInput {
            path: PathBuf::from("book.pdf"),
            format: PageFormat::Pdf,
            byte_size: 1,
        };
        assert!(PageImage::load(&input).is_err());
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page preparation: validate, decode or rasterise, enhance, optionally keep
// the enhanced image, and recognise. One call per input file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use scanbook_core::config::PipelineConfig;
use scanbook_core::error::{Result, ScanbookError};
use scanbook_core::naming::safe_file_name;
use tracing::{debug, info, instrument, warn};

use super::enhance::PageEnhancer;
use super::ocr::TextRecognizer;
use super::pdf::PdfRasterizer;
use super::validate::{FileValidator, PageImage};
use crate::fingerprint::short_digest;
use crate::image::processor::ImageProcessor;

/// Separator between the recognised text of consecutive PDF pages.
const PAGE_SEPARATOR: &str = "\n\n";

/// Raw recognition output for one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedText {
    pub text: String,
    /// Enhanced page images written to disk, in page order.
    pub enhanced_images: Vec<PathBuf>,
}

/// Turns an input file into raw recognised text.
///
/// Cheap to clone; the recognizer is shared.
#[derive(Clone)]
pub struct PagePreparer {
    validator: FileValidator,
    rasterizer: PdfRasterizer,
    recognizer: Arc<dyn TextRecognizer>,
    processed_image_dir: Option<PathBuf>,
}

impl PagePreparer {
    /// Default limits, no enhanced-image output.
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            validator: FileValidator::default(),
            rasterizer: PdfRasterizer::default(),
            recognizer,
            processed_image_dir: None,
        }
    }

    pub fn from_config(config: &PipelineConfig, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            validator: FileValidator::new(config.max_file_bytes),
            rasterizer: PdfRasterizer::new(config.ocr_dpi),
            recognizer,
            processed_image_dir: config
                .save_processed_images
                .then(|| config.processed_image_dir.clone()),
        }
    }

    /// Keep enhanced pages under `dir` (`None` disables).
    pub fn with_processed_image_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.processed_image_dir = dir;
        self
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// `true` when `path` passes validation.
    pub fn validate(&self, path: &Path) -> bool {
        self.validator.validate(path)
    }

    /// Run the fixed enhancement sequence on a decoded page.
    pub fn enhance(page: PageImage) -> DynamicImage {
        PageEnhancer::from_dynamic(page.image).enhance().into_dynamic()
    }

    /// Recognise text on an already enhanced image.
    pub fn recognize(&self, image: &DynamicImage) -> Result<String> {
        self.recognizer.recognize(image)
    }

    /// Validate, enhance and recognise every page of `path`.
    ///
    /// Raster files yield one page. PDFs yield one page per PDF page, and
    /// their texts are joined with a blank line. PDF pages are rendered one
    /// at a time, so at most one decoded page is held per call.
    #[instrument(skip_all, fields(path = %path.display(), engine = self.recognizer.name()))]
    pub fn process(&self, path: &Path) -> Result<PreparedText> {
        let input = self.validator.check(path)?;

        if input.format.is_raster() {
            self.process_pages(path, std::iter::once(PageImage::load(&input)))
        } else {
            let pages = self.rasterizer.pages(&input)?;
            if pages.page_count() == 0 {
                return Err(empty_document(path));
            }
            self.process_pages(path, pages)
        }
    }

    /// Enhance, optionally save, and recognise each page as it is pulled from
    /// `pages`. The first failing page ends the call.
    fn process_pages<I>(&self, path: &Path, pages: I) -> Result<PreparedText>
    where
        I: IntoIterator<Item = Result<PageImage>>,
    {
        let mut texts = Vec::new();
        let mut enhanced_images = Vec::new();
        for page in pages {
            let page = page?;
            let page_number = page.page;
            let enhanced = Self::enhance(page);

            if let Some(dir) = &self.processed_image_dir {
                let saved = self.save_enhanced(dir, path, page_number, &enhanced)?;
                enhanced_images.push(saved);
            }

            let text = self.recognizer.recognize(&enhanced)?;
            debug!(page = ?page_number, chars = text.len(), "Page recognised");
            texts.push(text);
        }
        if texts.is_empty() {
            return Err(empty_document(path));
        }

        let text = texts.join(PAGE_SEPARATOR);
        if text.trim().is_empty() {
            warn!("Recognition produced no text");
        }
        info!(pages = texts.len(), chars = text.len(), "Input prepared");

        Ok(PreparedText {
            text,
            enhanced_images,
        })
    }

    /// Write an enhanced page as `<stem>[_pNNN]_<digest>_processed.png`.
    fn save_enhanced(
        &self,
        dir: &Path,
        source: &Path,
        page: Option<u32>,
        image: &DynamicImage,
    ) -> Result<PathBuf> {
        let png = ImageProcessor::from_dynamic(image.clone()).to_png_bytes()?;

        let stem = source
            .file_stem()
            .map(|stem| safe_file_name(&stem.to_string_lossy()))
            .unwrap_or_else(|| "page".to_string());
        let page_suffix = page.map(|n| format!("_p{n:03}")).unwrap_or_default();
        let name = format!("{stem}{page_suffix}_{}_processed.png", short_digest(&png, 10));

        std::fs::create_dir_all(dir)?;
        let target = dir.join(name);
        std::fs::write(&target, &png).map_err(|err| {
            ScanbookError::ImageError(format!(
                "failed to save enhanced image {}: {}",
                target.display(),
                err
            ))
        })?;
        debug!(path = %target.display(), "Enhanced image saved");
        Ok(target)
    }
}

fn empty_document(path: &Path) -> ScanbookError {
    ScanbookError::PdfError(format!("{}: document has no pages", path.display()))
}

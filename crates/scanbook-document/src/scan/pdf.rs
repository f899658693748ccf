// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF rasterisation: page counting with `lopdf`, page rendering through
// poppler's `pdftoppm` (install: `apt install poppler-utils`).

use std::path::{Path, PathBuf};
use std::process::Command;

use lopdf::Document;
use scanbook_core::error::{Result, ScanbookError};
use scanbook_core::types::PageFormat;
use tracing::{debug, info, instrument};

use super::validate::{PageImage, ValidatedInput};
use crate::image::processor::ImageProcessor;

/// Default rasterisation resolution.
pub const DEFAULT_DPI: u32 = 300;

/// Renders PDF pages to raster images at a fixed resolution.
#[derive(Debug, Clone, Copy)]
pub struct PdfRasterizer {
    dpi: u32,
}

impl Default for PdfRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

impl PdfRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi: dpi.max(1) }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Number of pages in the PDF at `path`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn page_count(&self, path: &Path) -> Result<u32> {
        let document = Document::load(path).map_err(|err| {
            ScanbookError::PdfError(format!("failed to open {}: {}", path.display(), err))
        })?;
        let pages = document.get_pages().len() as u32;
        debug!(pages, "PDF page count");
        Ok(pages)
    }

    /// Rasterise one page (1-indexed).
    #[instrument(skip(self, path), fields(path = %path.display(), dpi = self.dpi))]
    pub fn render_page(&self, path: &Path, page: u32) -> Result<ImageProcessor> {
        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");
        let page_arg = page.to_string();
        let dpi_arg = self.dpi.to_string();

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi_arg, "-f", &page_arg, "-l", &page_arg])
            .arg(path)
            .arg(&prefix)
            .status();

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                return Err(ScanbookError::PdfError(format!(
                    "pdftoppm failed on page {} of {} ({})",
                    page,
                    path.display(),
                    status
                )));
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ScanbookError::PdfError(
                    "pdftoppm not found (install poppler-utils)".into(),
                ));
            }
            Err(err) => return Err(err.into()),
        }

        let rendered = find_page_image(workdir.path(), page).ok_or_else(|| {
            ScanbookError::PdfError(format!("no image generated for page {}", page))
        })?;
        // Decode before `workdir` is dropped.
        ImageProcessor::open(&rendered)
    }

    /// Lazily rasterised pages of a validated PDF input.
    ///
    /// The page count is read up front, so an unreadable PDF fails here.
    #[instrument(skip_all, fields(path = %input.path.display()))]
    pub fn pages(&self, input: &ValidatedInput) -> Result<PdfPages> {
        if input.format != PageFormat::Pdf {
            return Err(ScanbookError::InvalidInput(format!(
                "{}: not a PDF",
                input.path.display()
            )));
        }
        let count = self.page_count(&input.path)?;
        info!(pages = count, dpi = self.dpi, "Rasterising PDF");
        Ok(PdfPages {
            rasterizer: *self,
            source: input.path.clone(),
            byte_size: input.byte_size,
            count,
            next: 1,
        })
    }
}

/// pdftoppm pads page numbers to the width of the last page number.
fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    for digits in [1, 2, 3, 4] {
        let candidate = dir.join(format!("page-{:0width$}.png", page, width = digits));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Iterator over the pages of one PDF.
///
/// Pages are rendered independently on demand. Cloning yields an iterator
/// positioned at the same page; [`restart`](Self::restart) rewinds to page 1.
#[derive(Debug, Clone)]
pub struct PdfPages {
    rasterizer: PdfRasterizer,
    source: PathBuf,
    byte_size: u64,
    count: u32,
    next: u32,
}

impl PdfPages {
    pub fn page_count(&self) -> u32 {
        self.count
    }

    pub fn restart(&mut self) {
        self.next = 1;
    }
}

impl Iterator for PdfPages {
    type Item = Result<PageImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.count {
            return None;
        }
        let page = self.next;
        self.next += 1;

        let rendered = self.rasterizer.render_page(&self.source, page).map(|image| PageImage {
            source: self.source.clone(),
            format: PageFormat::Pdf,
            byte_size: self.byte_size,
            page: Some(page),
            dpi: Some(self.rasterizer.dpi),
            image: image.into_dynamic(),
        });
        Some(rendered)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PdfPages {}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, Stream, dictionary};

    /// Write a PDF with `pages` blank letter-size pages.
    fn blank_pdf(path: &Path, pages: u32) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn pdf_input(path: &Path) -> ValidatedInput {
        ValidatedInput {
            path: path.to_path_buf(),
            format: PageFormat::Pdf,
            byte_size: std::fs::metadata(path).unwrap().len(),
        }
    }

    #[test]
    fn counts_pages_with_lopdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapter.pdf");
        blank_pdf(&path, 3);
        assert_eq!(PdfRasterizer::default().page_count(&path).unwrap(), 3);
    }

    #[test]
    fn malformed_pdf_is_a_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 this is not really a pdf").unwrap();
        let err = PdfRasterizer::default().pages(&pdf_input(&path)).unwrap_err();
        assert!(matches!(err, ScanbookError::PdfError(_)));
    }

    #[test]
    fn page_sequence_is_finite_and_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pdf");
        blank_pdf(&path, 2);

        let mut pages = PdfRasterizer::new(72).pages(&pdf_input(&path)).unwrap();
        assert_eq!(pages.len(), 2);
        let snapshot = pages.clone();

        // Rendering may fail without pdftoppm; the sequence length may not.
        assert_eq!(pages.by_ref().count(), 2);
        assert!(pages.next().is_none());
        pages.restart();
        assert_eq!(pages.len(), 2);
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn non_pdf_input_is_refused() {
        let input = ValidatedInput {
            path: PathBuf::from("page.png"),
            format: PageFormat::Png,
            byte_size: 1,
        };
        assert!(matches!(
            PdfRasterizer::default().pages(&input),
            Err(ScanbookError::InvalidInput(_))
        ));
    }
}

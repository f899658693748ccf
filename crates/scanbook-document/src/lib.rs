// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanbook-document: Image preparation for the Scanbook pipeline.
//
// Validates untrusted input files, enhances scanned pages for recognition
// (grayscale, contrast, sharpen, binarize), rasterises PDF pages, and runs
// optical character recognition over the result.

pub mod fingerprint;
pub mod image;
pub mod scan;

// Re-export the primary structs so callers can use `scanbook_document::PagePreparer` etc.
pub use image::processor::ImageProcessor;
pub use scan::enhance::PageEnhancer;
pub use scan::ocr::TextRecognizer;
pub use scan::pdf::{PdfPages, PdfRasterizer};
pub use scan::preparer::{PagePreparer, PreparedText};
pub use scan::tesseract::TesseractRecognizer;
pub use scan::validate::{FileValidator, PageImage};

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrsRecognizer;

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: input validation, page enhancement, PDF rasterisation,
// and optical character recognition (OCR).

pub mod enhance;
pub mod ocr;
pub mod pdf;
pub mod preparer;
pub mod tesseract;
pub mod validate;

pub use enhance::PageEnhancer;
pub use ocr::TextRecognizer;
pub use preparer::PagePreparer;
pub use tesseract::TesseractRecognizer;
pub use validate::FileValidator;

#[cfg(feature = "ocr")]
pub use ocr::OcrsRecognizer;

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page enhancement pipeline: the fixed preprocessing sequence applied to
// every scanned page before recognition.

use image::DynamicImage;
use tracing::{debug, instrument};

use crate::image::processor::ImageProcessor;

/// Contrast multiplier applied around the page's mean luminance.
pub const CONTRAST_FACTOR: f32 = 2.0;

/// Luma above this value becomes white, the rest black.
pub const BINARIZE_THRESHOLD: u8 = 200;

/// Prepares a scanned page for recognition.
///
/// The sequence is fixed and deterministic: the same input image always
/// yields the same output bytes.
///
/// 1. Convert to grayscale
/// 2. Boost contrast (factor 2.0 around the mean)
/// 3. Sharpen (one 3x3 pass)
/// 4. Binarize at 200/255
pub struct PageEnhancer {
    /// The working image.
    image: DynamicImage,
}

impl PageEnhancer {
    /// Create an enhancer wrapping an existing `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Consume the enhancer and return the underlying image.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Enhancement pipeline -------------------------------------------------

    /// Run the full enhancement sequence.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn enhance(self) -> Self {
        let image = ImageProcessor::from_dynamic(self.image)
            .grayscale()
            .adjust_contrast(CONTRAST_FACTOR)
            .sharpen()
            .threshold(BINARIZE_THRESHOLD)
            .into_dynamic();

        debug!("Page enhancement complete");
        Self { image }
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    /// Synthetic page: light paper with a dark "text" bar and a mid-grey smudge.
    fn synthetic_page() -> DynamicImage {
        let img = RgbImage::from_fn(120, 80, |x, y| {
            if (20..100).contains(&x) && (30..40).contains(&y) {
                Rgb([20, 20, 25])
            } else if (10..30).contains(&x) && (55..70).contains(&y) {
                Rgb([150, 140, 135])
            } else {
                Rgb([235, 230, 220])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn enhancement_is_deterministic() {
        let first = PageEnhancer::from_dynamic(synthetic_page()).enhance().into_dynamic();
        let second = PageEnhancer::from_dynamic(synthetic_page()).enhance().into_dynamic();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn output_is_binary_single_channel() {
        let out = PageEnhancer::from_dynamic(synthetic_page()).enhance().into_dynamic();
        let DynamicImage::ImageLuma8(gray) = out else {
            panic!("expected a Luma8 image");
        };
        assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(gray.dimensions(), (120, 80));
    }

    #[test]
    fn paper_turns_white_and_ink_black() {
        let out = PageEnhancer::from_dynamic(synthetic_page())
            .enhance()
            .into_dynamic()
            .to_luma8();
        // Well inside the paper area and well inside the text bar.
        assert_eq!(out.get_pixel(60, 10).0[0], 255);
        assert_eq!(out.get_pixel(60, 35).0[0], 0);
    }

    #[test]
    fn uniform_page_does_not_panic() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([255u8])));
        let out = PageEnhancer::from_dynamic(img).enhance().into_dynamic().to_luma8();
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: grayscale conversion, contrast stretching, sharpening,
// and fixed-threshold binarization. Operates on in-memory images using the
// `image` and `imageproc` crates.

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::filter::filter3x3;
use scanbook_core::error::ScanbookError;
use tracing::{debug, info, instrument};

/// 3x3 sharpening kernel, centre weight 32 and neighbours -2, normalised by
/// the kernel sum (16).
const SHARPEN_KERNEL: [f32; 9] = [
    -0.125, -0.125, -0.125, //
    -0.125, 2.0, -0.125, //
    -0.125, -0.125, -0.125,
];

/// Image processing pipeline operating on a single in-memory image.
///
/// All operations are non-destructive: each method consumes `self` and returns a
/// new `ImageProcessor` wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let page = ImageProcessor::open("page_012.jpg")?
///     .grayscale()
///     .adjust_contrast(2.0)
///     .sharpen()
///     .threshold(200)
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, ScanbookError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanbookError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, TIFF).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanbookError> {
        let img = image::load_from_memory(data).map_err(|err| {
            ScanbookError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Convert the image to single-channel 8-bit luma.
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        debug!("Converting to grayscale");
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Scale every pixel's distance from the image's mean luminance by
    /// `factor`. Values > 1.0 increase contrast; 1.0 is a no-op.
    ///
    /// The output is single-channel.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let gray = self.image.to_luma8();
        let pixel_count = gray.width() as u64 * gray.height() as u64;
        if pixel_count == 0 {
            return Self {
                image: DynamicImage::ImageLuma8(gray),
            };
        }

        let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
        let mean = (sum as f32 / pixel_count as f32 + 0.5).floor();
        debug!(factor, mean, "Adjusting contrast");

        let contrasted = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            let val = mean + factor * (gray.get_pixel(x, y).0[0] as f32 - mean);
            Luma([val.round().clamp(0.0, 255.0) as u8])
        });

        Self {
            image: DynamicImage::ImageLuma8(contrasted),
        }
    }

    /// Apply one pass of a 3x3 sharpening kernel. Borders are padded by
    /// continuity so no dark frame is introduced.
    #[instrument(skip(self))]
    pub fn sharpen(self) -> Self {
        debug!("Sharpening");
        let gray = self.image.to_luma8();
        let sharpened: GrayImage = filter3x3::<_, f32, u8>(&gray, &SHARPEN_KERNEL);
        Self {
            image: DynamicImage::ImageLuma8(sharpened),
        }
    }

    /// Global binarization: luma strictly above `level` becomes white,
    /// everything else black.
    #[instrument(skip(self), fields(level))]
    pub fn threshold(self, level: u8) -> Self {
        debug!(level, "Applying fixed threshold");

        let gray = self.image.to_luma8();
        let (width, height) = gray.dimensions();
        let mut output = GrayImage::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let val = gray.get_pixel(x, y).0[0];
                let binary = if val > level { 255u8 } else { 0u8 };
                output.put_pixel(x, y, Luma([binary]));
            }
        }

        Self {
            image: DynamicImage::ImageLuma8(output),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ScanbookError> {
        encode_to_format(&self.image, ImageFormat::Png)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ScanbookError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| ScanbookError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}

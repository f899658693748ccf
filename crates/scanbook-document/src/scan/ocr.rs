// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR (Optical Character Recognition) seam for Scanbook.
//
// `TextRecognizer` is the trait every recognition engine implements. The
// default engine is Tesseract (see `tesseract.rs`); a pure-Rust engine backed
// by the `ocrs` crate is available behind the `ocr` feature:
//
// ```toml
// scanbook-document = { path = "crates/scanbook-document", features = ["ocr"] }
// ```
//
// The `ocrs` engine requires two model files, `text-detection.rten` and
// `text-recognition.rten`, cached by default under `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`). Running `ocrs-cli` once downloads them.

use image::DynamicImage;
use scanbook_core::error::Result;

/// A recognition engine.
///
/// Engines check their own availability when constructed and fail with
/// [`ScanbookError::EngineUnavailable`](scanbook_core::ScanbookError::EngineUnavailable)
/// there, never on first use. `recognize` returns the raw engine output with
/// no post-processing.
pub trait TextRecognizer: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognise all text on an enhanced full-page image.
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

#[cfg(feature = "ocr")]
pub use ocrs_engine::{OcrConfig, OcrsRecognizer};

#[cfg(feature = "ocr")]
mod ocrs_engine {
    use std::path::{Path, PathBuf};

    use image::DynamicImage;
    use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
    use rten::Model;
    use scanbook_core::error::{Result, ScanbookError};
    use tracing::{debug, info, instrument};

    use super::TextRecognizer;

    /// Well-known filenames for the detection and recognition models.
    const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
    const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

    /// Default directory for cached OCR model files.
    fn default_model_dir() -> PathBuf {
        if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
            PathBuf::from(xdg).join("ocrs")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home).join(".cache").join("ocrs")
        } else {
            PathBuf::from("ocrs-models")
        }
    }

    /// Model locations for [`OcrsRecognizer`].
    #[derive(Debug, Clone)]
    pub struct OcrConfig {
        pub detection_model_path: PathBuf,
        pub recognition_model_path: PathBuf,
    }

    impl Default for OcrConfig {
        fn default() -> Self {
            Self::from_dir(default_model_dir())
        }
    }

    impl OcrConfig {
        /// Expects the directory to contain `text-detection.rten` and
        /// `text-recognition.rten`.
        pub fn from_dir(dir: impl AsRef<Path>) -> Self {
            let dir = dir.as_ref();
            Self {
                detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
                recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
            }
        }

        /// Verify that both model files exist.
        pub fn validate(&self) -> Result<()> {
            for path in [&self.detection_model_path, &self.recognition_model_path] {
                if !path.exists() {
                    return Err(ScanbookError::EngineUnavailable(format!(
                        "ocrs model not found at {}; run `ocrs-cli` once to download models",
                        path.display()
                    )));
                }
            }
            Ok(())
        }
    }

    /// Pure-Rust recognizer backed by `ocrs` neural network models.
    ///
    /// Model loading is the expensive step: build one recognizer and share it
    /// across workers.
    pub struct OcrsRecognizer {
        engine: OcrsEngine,
    }

    impl OcrsRecognizer {
        #[instrument(skip_all, fields(
            detection = %config.detection_model_path.display(),
            recognition = %config.recognition_model_path.display(),
        ))]
        pub fn new(config: OcrConfig) -> Result<Self> {
            config.validate()?;

            let load = |path: &Path| {
                Model::load_file(path).map_err(|err| {
                    ScanbookError::EngineUnavailable(format!(
                        "failed to load model from {}: {}",
                        path.display(),
                        err
                    ))
                })
            };
            let detection_model = load(&config.detection_model_path)?;
            let recognition_model = load(&config.recognition_model_path)?;

            let engine = OcrsEngine::new(OcrEngineParams {
                detection_model: Some(detection_model),
                recognition_model: Some(recognition_model),
                ..Default::default()
            })
            .map_err(|err| {
                ScanbookError::EngineUnavailable(format!("failed to initialise ocrs: {}", err))
            })?;

            info!("ocrs engine initialised");
            Ok(Self { engine })
        }
    }

    impl TextRecognizer for OcrsRecognizer {
        fn name(&self) -> &str {
            "ocrs"
        }

        #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
        fn recognize(&self, image: &DynamicImage) -> Result<String> {
            let rgb = image.to_rgb8();
            let (width, height) = rgb.dimensions();

            let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
                ScanbookError::OcrError(format!(
                    "failed to create image source ({}x{}): {}",
                    width, height, err
                ))
            })?;
            let input = self
                .engine
                .prepare_input(source)
                .map_err(|err| ScanbookError::OcrError(format!("OCR preprocessing failed: {}", err)))?;
            let text = self
                .engine
                .get_text(&input)
                .map_err(|err| ScanbookError::OcrError(format!("OCR text recognition failed: {}", err)))?;

            debug!(line_count = text.lines().count(), "ocrs recognition complete");
            Ok(text)
        }
    }

}

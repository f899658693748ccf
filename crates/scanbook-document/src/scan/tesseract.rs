// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract OCR engine, driven through the `tesseract` command-line tool.
//
// Install: `apt install tesseract-ocr` (plus `tesseract-ocr-<lang>` packages
// for languages other than English) or `brew install tesseract`.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat};
use scanbook_core::error::{Result, ScanbookError};
use tracing::{debug, info, instrument, warn};

use super::ocr::TextRecognizer;

/// Page segmentation mode 1: automatic page segmentation with orientation
/// and script detection. Inputs are full book pages, not isolated fields.
const PAGE_SEGMENTATION_MODE: &str = "1";

/// How often a running tesseract process is checked against its deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Recognizer that shells out to the Tesseract binary.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
    /// Per-page deadline; the tesseract process is killed when it passes.
    page_timeout: Option<Duration>,
}

impl TesseractRecognizer {
    /// Locate `tesseract` on `PATH` and verify it supports `language`.
    ///
    /// `language` uses Tesseract syntax, e.g. `eng` or `eng+deu`.
    pub fn new(language: &str) -> Result<Self> {
        let binary = which::which("tesseract").map_err(|_| {
            ScanbookError::EngineUnavailable(
                "tesseract not found in PATH (install tesseract-ocr)".into(),
            )
        })?;
        Self::with_binary(binary, language)
    }

    /// Use an explicit Tesseract binary.
    #[instrument(skip_all, fields(binary = %binary.as_ref().display(), language))]
    pub fn with_binary(binary: impl AsRef<Path>, language: &str) -> Result<Self> {
        let binary = binary.as_ref().to_path_buf();

        let version = Command::new(&binary).arg("--version").output().map_err(|err| {
            ScanbookError::EngineUnavailable(format!(
                "cannot run {}: {}",
                binary.display(),
                err
            ))
        })?;
        if !version.status.success() {
            return Err(ScanbookError::EngineUnavailable(format!(
                "{} --version exited with {}",
                binary.display(),
                version.status
            )));
        }

        let listing = Command::new(&binary).arg("--list-langs").output().map_err(|err| {
            ScanbookError::EngineUnavailable(format!("cannot list tesseract languages: {}", err))
        })?;
        // Older releases print the list on stderr.
        let mut combined = String::from_utf8_lossy(&listing.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&listing.stderr));
        let installed = parse_language_list(&combined);
        if let Some(missing) = missing_languages(language, &installed).first() {
            return Err(ScanbookError::EngineUnavailable(format!(
                "tesseract language data {missing:?} is not installed"
            )));
        }

        let first_line = String::from_utf8_lossy(&version.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_owned();
        info!(version = %first_line, language, "Tesseract ready");

        Ok(Self {
            binary,
            language: language.to_owned(),
            page_timeout: None,
        })
    }

    /// Kill tesseract if a single page takes longer than `timeout`
    /// (`None` waits indefinitely).
    pub fn with_page_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let work = tempfile::Builder::new().prefix("scanbook-page-").tempdir()?;
        let page = work.path().join("page.png");
        let output_base = work.path().join("out");
        image.save_with_format(&page, ImageFormat::Png).map_err(|err| {
            ScanbookError::OcrError(format!("failed to stage page for tesseract: {}", err))
        })?;

        // Output goes to files, not pipes, so a chatty process can never
        // block on a full pipe while its deadline is being polled.
        let stderr_path = work.path().join("stderr.log");
        let stderr = File::create(&stderr_path)?;
        let child = Command::new(&self.binary)
            .arg(&page)
            .arg(&output_base)
            .args(["-l", &self.language])
            .args(["--psm", PAGE_SEGMENTATION_MODE])
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(|err| ScanbookError::OcrError(format!("cannot run tesseract: {}", err)))?;

        let status = wait_with_deadline(child, self.page_timeout)?;
        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(ScanbookError::OcrError(format!(
                "tesseract exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let bytes = std::fs::read(output_base.with_extension("txt")).map_err(|err| {
            ScanbookError::OcrError(format!("tesseract produced no output: {}", err))
        })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        debug!(chars = text.len(), "Tesseract recognition complete");
        Ok(text)
    }
}

/// Wait for `child`, killing it once `deadline` has elapsed.
fn wait_with_deadline(mut child: Child, deadline: Option<Duration>) -> Result<ExitStatus> {
    let Some(limit) = deadline else {
        return Ok(child.wait()?);
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            if let Err(err) = child.kill() {
                warn!(error = %err, pid = child.id(), "Could not kill tesseract");
            }
            // Reap the process so it does not linger as a zombie.
            let _ = child.wait();
            return Err(ScanbookError::Timeout(limit.as_secs()));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Parse `tesseract --list-langs` output. The first line is a header
/// ("List of available languages ...").
fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available"))
        .map(str::to_owned)
        .collect()
}

/// Components of a `+`-joined language list that are not installed.
fn missing_languages(languages: &str, installed: &[String]) -> Vec<String> {
    languages
        .split('+')
        .map(str::trim)
        .filter(|lang| !lang.is_empty() && !installed.iter().any(|have| have == lang))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_engine_unavailable() {
        let err = TesseractRecognizer::with_binary("/nonexistent/bin/tesseract", "eng")
            .unwrap_err();
        assert!(matches!(err, ScanbookError::EngineUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn overdue_process_is_killed() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let started = Instant::now();

        let err = wait_with_deadline(child, Some(Duration::from_millis(200))).unwrap_err();
        assert!(matches!(err, ScanbookError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn finished_process_reports_its_status() {
        let child = Command::new("true").spawn().unwrap();
        let status = wait_with_deadline(child, Some(Duration::from_secs(10))).unwrap();
        assert!(status.success());

        let child = Command::new("false").spawn().unwrap();
        assert!(!wait_with_deadline(child, None).unwrap().success());
    }

    #[test]
    fn language_listing_skips_header() {
        let listing = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\ndeu\n";
        assert_eq!(parse_language_list(listing), vec!["eng", "osd", "deu"]);
    }

    #[test]
    fn combined_language_specs_are_checked_per_component() {
        let installed = vec!["eng".to_string(), "osd".to_string()];
        assert!(missing_languages("eng", &installed).is_empty());
        assert_eq!(missing_languages("eng+ita", &installed), vec!["ita"]);
    }
}

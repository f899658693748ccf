// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch conversion: per-file conversion and the bounded worker pool that
// drives it, plus the end-to-end run (discover, convert, assemble, report).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scanbook_core::config::PipelineConfig;
use scanbook_core::error::{Result, ScanbookError};
use scanbook_core::types::{BatchReport, ConversionResult};
use scanbook_document::{PagePreparer, TextRecognizer};
use scanbook_text::{SubstitutionTable, TextStructurer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use crate::assemble::BookAssembler;
use crate::discover::{WorkUnit, discover, plan_units};
use crate::report::write_report;

/// Appended to failure reasons caused by the engine or environment rather
/// than the input file itself.
pub const PIPELINE_FAULT_TAG: &str = "(pipeline fault, not specific to this file)";

/// Converts one input file: page preparation, then text structuring.
#[derive(Clone)]
pub struct Converter {
    preparer: PagePreparer,
    structurer: TextStructurer,
}

impl Converter {
    pub fn new(preparer: PagePreparer, structurer: TextStructurer) -> Self {
        Self {
            preparer,
            structurer,
        }
    }

    /// Convert `unit`, turning any error into a failure result. Errors that
    /// are not about the file itself (an engine that vanished mid-run, say)
    /// are logged at error level and tagged with [`PIPELINE_FAULT_TAG`].
    #[instrument(skip_all, fields(path = %unit.input.display(), sequence = unit.sequence))]
    pub fn process_one(&self, unit: &WorkUnit) -> ConversionResult {
        match self.convert(unit) {
            Ok((markdown, enhanced_images)) => {
                ConversionResult::success(unit.sequence, unit.input.clone(), markdown, enhanced_images)
            }
            Err(err) if err.is_per_file() => {
                warn!(error = %err, "Conversion failed");
                ConversionResult::failure(unit.sequence, unit.input.clone(), err.to_string())
            }
            Err(err) => {
                error!(error = %err, "Conversion failed for a reason outside this file");
                ConversionResult::failure(
                    unit.sequence,
                    unit.input.clone(),
                    format!("{err} {PIPELINE_FAULT_TAG}"),
                )
            }
        }
    }

    fn convert(&self, unit: &WorkUnit) -> Result<(PathBuf, Vec<PathBuf>)> {
        let prepared = self.preparer.process(&unit.input)?;
        let output = self.structurer.process(&prepared.text, &unit.name)?;
        Ok((output.path, prepared.enhanced_images))
    }
}

/// Result of [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunOutcome {
    /// Per-file results, in discovery order.
    pub results: Vec<ConversionResult>,
    pub report: BatchReport,
    pub book_dir: PathBuf,
    pub report_path: PathBuf,
}

/// Drives conversions over a bounded worker pool and assembles the book.
pub struct Orchestrator {
    converter: Converter,
    assembler: BookAssembler,
    workers: usize,
    timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(converter: Converter, assembler: BookAssembler) -> Self {
        Self {
            converter,
            assembler,
            workers: 1,
            timeout: None,
        }
    }

    /// Wire every stage from `config`. The recognizer must already be
    /// constructed, so an unavailable engine has failed before this point.
    pub fn from_config(
        config: &PipelineConfig,
        recognizer: Arc<dyn TextRecognizer>,
        substitutions: SubstitutionTable,
    ) -> Self {
        let converter = Converter::new(
            PagePreparer::from_config(config, recognizer),
            TextStructurer::from_config(config, substitutions),
        );
        Self::new(converter, BookAssembler::from_config(config))
            .with_workers(config.worker_count())
            .with_timeout(config.per_file_timeout())
    }

    /// Pool size; clamped to at least one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Per-file deadline (`None` disables).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn process_one(&self, unit: &WorkUnit) -> ConversionResult {
        self.converter.process_one(unit)
    }

    /// Convert every unit with at most `workers` conversions running at once.
    ///
    /// Always returns one result per unit, in completion order. A failing,
    /// panicking or timed-out conversion becomes a failure result and never
    /// affects its siblings. A timed-out conversion keeps its pool slot until
    /// its blocking work actually finishes, so recognizers should enforce a
    /// deadline of their own (see `TesseractRecognizer::with_page_timeout`).
    #[instrument(skip_all, fields(units = units.len(), workers = self.workers))]
    pub async fn process_batch(&self, units: Vec<WorkUnit>) -> Vec<ConversionResult> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<tokio::task::Id, (usize, PathBuf)> = HashMap::new();
        let total = units.len();

        for unit in units {
            let semaphore = Arc::clone(&semaphore);
            let converter = self.converter.clone();
            let timeout = self.timeout;
            let (sequence, input) = (unit.sequence, unit.input.clone());

            let handle = tasks.spawn(async move {
                let failure = |err: ScanbookError| {
                    ConversionResult::failure(unit.sequence, unit.input.clone(), err.to_string())
                };
                let permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return failure(ScanbookError::Worker("worker pool closed".into())),
                };

                let job_unit = unit.clone();
                let job = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    converter.process_one(&job_unit)
                });

                let joined = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, job).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            warn!(path = %unit.input.display(), "Conversion timed out");
                            return failure(ScanbookError::Timeout(limit.as_secs()));
                        }
                    },
                    None => job.await,
                };

                match joined {
                    Ok(result) => result,
                    Err(err) => failure(ScanbookError::Worker(join_error_message(&err))),
                }
            });
            pending.insert(handle.id(), (sequence, input));
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next_with_id().await {
            let result = match joined {
                Ok((id, result)) => {
                    pending.remove(&id);
                    result
                }
                Err(err) => {
                    let Some((sequence, input)) = pending.remove(&err.id()) else {
                        error!(error = %err, "Unknown batch task failed");
                        continue;
                    };
                    let reason = ScanbookError::Worker(join_error_message(&err));
                    ConversionResult::failure(sequence, input, reason.to_string())
                }
            };
            info!(
                path = %result.input.display(),
                success = result.is_success(),
                done = results.len() + 1,
                total,
                "File processed"
            );
            results.push(result);
        }
        results
    }

    /// Discover inputs under `input`, convert them, assemble the book and
    /// write the batch report next to it.
    #[instrument(skip_all, fields(path = %input.display(), recursive))]
    pub async fn run(&self, input: &Path, recursive: bool) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let units = plan_units(discover(input, recursive)?);
        info!(files = units.len(), "Starting batch");

        let mut results = self.process_batch(units).await;
        results.sort_by_key(|result| result.sequence);

        let book_dir = self.assembler.assemble(&results)?;

        let mut report = BatchReport::from_results(&results, started_at);
        report.book_dir = Some(book_dir.clone());
        let report_path = write_report(&report, self.assembler.output_dir())?;

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_secs = report.elapsed_secs(),
            "Batch complete"
        );
        for failure in &report.failures {
            warn!(path = %failure.input.display(), reason = %failure.reason, "File excluded from book");
        }

        Ok(RunOutcome {
            results,
            report,
            book_dir,
            report_path,
        })
    }
}

fn join_error_message(err: &tokio::task::JoinError) -> String {
    if err.is_panic() {
        "conversion panicked".to_string()
    } else {
        "conversion was cancelled".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use scanbook_core::BookMetadata;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns canned text; optionally sleeps or panics on specific inputs
    /// (keyed by image width).
    struct ScriptedRecognizer {
        slow_width: Option<u32>,
        panic_width: Option<u32>,
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedRecognizer {
        fn plain() -> Self {
            Self {
                slow_width: None,
                panic_width: None,
                delay: Duration::from_millis(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn name(&self) -> &str {
            "scripted"
        }

        fn recognize(&self, image: &DynamicImage) -> Result<String> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if self.panic_width == Some(image.width()) {
                self.running.fetch_sub(1, Ordering::SeqCst);
                panic!("recognizer crashed");
            }
            let delay = if self.slow_width == Some(image.width()) {
                Duration::from_millis(1500)
            } else {
                self.delay
            };
            std::thread::sleep(delay);

            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("PAGE {}\nCHAPTER 1\nText of width {}.", image.width(), image.width()))
        }
    }

    /// Fails every page, either as a bad page or as a missing engine.
    struct BrokenRecognizer {
        engine_gone: bool,
    }

    impl TextRecognizer for BrokenRecognizer {
        fn name(&self) -> &str {
            "broken"
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<String> {
            if self.engine_gone {
                Err(ScanbookError::EngineUnavailable("tesseract vanished".into()))
            } else {
                Err(ScanbookError::OcrError("page is blank".into()))
            }
        }
    }

    fn write_page(dir: &Path, name: &str, width: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, 20, Rgb([240, 240, 240])).save(&path).unwrap();
        path
    }

    fn orchestrator(root: &Path, recognizer: Arc<dyn TextRecognizer>) -> Orchestrator {
        let converter = Converter::new(
            PagePreparer::new(recognizer),
            TextStructurer::new(root.join("md"), SubstitutionTable::default()),
        );
        let assembler = BookAssembler::new(
            root.join("book"),
            BookMetadata {
                title: "Test Book".into(),
                author: "Tester".into(),
                description: "A test".into(),
            },
        );
        Orchestrator::new(converter, assembler).with_workers(2)
    }

    #[test]
    fn engine_faults_are_tagged_but_file_faults_are_not() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_page(dir.path(), "page_1.png", 30);
        let unit = WorkUnit {
            sequence: 0,
            input: input.clone(),
            name: "page_1".into(),
        };
        let converter = |engine_gone| {
            Converter::new(
                PagePreparer::new(Arc::new(BrokenRecognizer { engine_gone })),
                TextStructurer::new(dir.path().join("md"), SubstitutionTable::default()),
            )
        };

        let file_fault = converter(false).process_one(&unit);
        let reason = file_fault.failure_reason().unwrap();
        assert!(reason.contains("page is blank"));
        assert!(!reason.contains(PIPELINE_FAULT_TAG));

        let engine_fault = converter(true).process_one(&unit);
        assert_eq!(engine_fault.input, input);
        let reason = engine_fault.failure_reason().unwrap();
        assert!(reason.starts_with("recognition engine unavailable: tesseract vanished"));
        assert!(reason.ends_with(PIPELINE_FAULT_TAG));
    }

    #[tokio::test]
    async fn one_corrupt_file_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        std::fs::create_dir(&scans).unwrap();
        for i in 1..=4 {
            write_page(&scans, &format!("page_{i}.png"), 10 + i);
        }
        std::fs::write(scans.join("page_5.jpg"), b"corrupt bytes").unwrap();

        let orchestrator = orchestrator(dir.path(), Arc::new(ScriptedRecognizer::plain()));
        let units = plan_units(discover(&scans, false).unwrap());
        let results = orchestrator.process_batch(units).await;

        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 4);
        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].input.ends_with("page_5.jpg"));
        assert!(failed[0].failure_reason().unwrap().contains("image processing failed"));
    }

    #[tokio::test]
    async fn pool_size_bounds_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        std::fs::create_dir(&scans).unwrap();
        for i in 0..6 {
            write_page(&scans, &format!("p{i}.png"), 8 + i);
        }
        let recognizer = Arc::new(ScriptedRecognizer {
            delay: Duration::from_millis(50),
            ..ScriptedRecognizer::plain()
        });

        let results = orchestrator(dir.path(), recognizer.clone())
            .process_batch(plan_units(discover(&scans, false).unwrap()))
            .await;

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.is_success()));
        assert!(recognizer.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_conversion_becomes_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        std::fs::create_dir(&scans).unwrap();
        write_page(&scans, "ok.png", 12);
        write_page(&scans, "boom.png", 13);
        let recognizer = Arc::new(ScriptedRecognizer {
            panic_width: Some(13),
            ..ScriptedRecognizer::plain()
        });

        let results = orchestrator(dir.path(), recognizer)
            .process_batch(plan_units(discover(&scans, false).unwrap()))
            .await;

        assert_eq!(results.len(), 2);
        let boom = results.iter().find(|r| r.input.ends_with("boom.png")).unwrap();
        assert!(boom.failure_reason().unwrap().contains("panicked"));
        assert!(results.iter().any(|r| r.is_success()));
    }

    // Hardening beyond the reference behaviour: a hung file must not hold
    // up the batch.
    #[tokio::test]
    async fn slow_file_times_out_without_affecting_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        std::fs::create_dir(&scans).unwrap();
        write_page(&scans, "fast.png", 12);
        write_page(&scans, "slow.png", 14);
        let recognizer = Arc::new(ScriptedRecognizer {
            slow_width: Some(14),
            ..ScriptedRecognizer::plain()
        });

        let results = orchestrator(dir.path(), recognizer)
            .with_timeout(Some(Duration::from_millis(300)))
            .process_batch(plan_units(discover(&scans, false).unwrap()))
            .await;

        let slow = results.iter().find(|r| r.input.ends_with("slow.png")).unwrap();
        assert!(slow.failure_reason().unwrap().contains("timed out"));
        let fast = results.iter().find(|r| r.input.ends_with("fast.png")).unwrap();
        assert!(fast.is_success());

        // The abandoned worker still writes into the temp dir; let it finish.
        // This recognizer ignores the deadline; the Tesseract engine kills its
        // own process when the per-page deadline passes.
        tokio::time::sleep(Duration::from_millis(1500)).await;
    }

    #[tokio::test]
    async fn run_assembles_in_discovery_order_and_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        std::fs::create_dir(&scans).unwrap();
        write_page(&scans, "page_10.png", 30);
        write_page(&scans, "page_2.png", 20);
        write_page(&scans, "page_1.png", 10);
        std::fs::write(scans.join("page_3.png"), b"not a png").unwrap();

        let outcome = orchestrator(dir.path(), Arc::new(ScriptedRecognizer::plain()))
            .run(&scans, false)
            .await
            .unwrap();

        assert_eq!(outcome.report.total, 4);
        assert_eq!(outcome.report.succeeded, 3);
        assert_eq!(outcome.report.failed, 1);
        assert!(outcome.report.failures[0].input.ends_with("page_3.png"));
        assert!(outcome.report_path.exists());

        let summary = std::fs::read_to_string(outcome.book_dir.join("src/SUMMARY.md")).unwrap();
        let entries: Vec<_> = summary.lines().filter(|l| l.starts_with("- [")).collect();
        assert_eq!(
            entries,
            vec![
                "- [Page 1](chapter_01_page_1.md)",
                "- [Page 2](chapter_02_page_2.md)",
                "- [Page 10](chapter_03_page_10.md)",
            ]
        );
    }

    #[tokio::test]
    async fn empty_directory_yields_a_scaffold_only_book() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        std::fs::create_dir(&scans).unwrap();

        let outcome = orchestrator(dir.path(), Arc::new(ScriptedRecognizer::plain()))
            .run(&scans, false)
            .await
            .unwrap();

        assert_eq!(outcome.report.total, 0);
        assert!(outcome.book_dir.join("src/glossary.md").exists());
        let summary = std::fs::read_to_string(outcome.book_dir.join("src/SUMMARY.md")).unwrap();
        assert!(!summary.contains("- ["));
    }
}

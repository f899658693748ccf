// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use scanbook_core::PipelineConfig;
use scanbook_core::error::Result;
use scanbook_document::{FileValidator, TesseractRecognizer, TextRecognizer};
use scanbook_pipeline::{Orchestrator, RunOutcome};
use scanbook_text::SubstitutionTable;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "scanbook")]
#[command(about = "Convert scanned textbook pages into a structured markdown book")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file (environment variables still take precedence)
    #[arg(long, global = true, env = "SCANBOOK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run OCR over a file or directory and assemble the book
    Convert(ConvertArgs),

    /// Check whether files would be accepted for conversion
    Validate {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Scanned page, PDF, or directory of them
    input: PathBuf,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// JSON object of OCR misreading fixes, replacing the built-in table
    #[arg(long)]
    substitutions: Option<PathBuf>,

    /// Number of files converted at once
    #[arg(short, long)]
    threads: Option<usize>,

    /// Do not keep copies of the enhanced page images
    #[arg(long)]
    no_save_images: bool,

    /// Recognition engine
    #[cfg(feature = "ocr")]
    #[arg(long, value_enum, default_value_t = Engine::Tesseract)]
    engine: Engine,

    /// Directory holding the ocrs models
    #[cfg(feature = "ocr")]
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

#[cfg(feature = "ocr")]
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Engine {
    Tesseract,
    Ocrs,
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Convert(args) => convert(cli.config.as_deref(), args).await,
        Command::Validate { files } => validate(cli.config.as_deref(), &files),
    }
}

async fn convert(config_path: Option<&Path>, args: ConvertArgs) -> Result<ExitCode> {
    let mut config = PipelineConfig::load(config_path)?;
    apply_flags(&mut config, &args);
    config.validate()?;

    let substitutions = match &args.substitutions {
        Some(path) => SubstitutionTable::from_file(path)?,
        None => SubstitutionTable::default(),
    };
    let recognizer = recognizer(&config, &args)?;
    info!(engine = recognizer.name(), workers = config.worker_count(), "Pipeline ready");

    let orchestrator = Orchestrator::from_config(&config, recognizer, substitutions);
    let outcome = orchestrator.run(&args.input, args.recursive).await?;
    print!("{}", summary(&outcome));
    Ok(ExitCode::SUCCESS)
}

/// Command-line flags win over file and environment settings.
fn apply_flags(config: &mut PipelineConfig, args: &ConvertArgs) {
    if let Some(threads) = args.threads {
        config.ocr_threads = threads;
    }
    if args.no_save_images {
        config.save_processed_images = false;
    }
}

#[cfg(not(feature = "ocr"))]
fn recognizer(config: &PipelineConfig, _args: &ConvertArgs) -> Result<Arc<dyn TextRecognizer>> {
    Ok(Arc::new(tesseract(config)?))
}

/// Tesseract with the per-file deadline applied to each page, so a hung
/// process is killed rather than abandoned.
fn tesseract(config: &PipelineConfig) -> Result<TesseractRecognizer> {
    Ok(TesseractRecognizer::new(&config.ocr_language)?.with_page_timeout(config.per_file_timeout()))
}

#[cfg(feature = "ocr")]
fn recognizer(config: &PipelineConfig, args: &ConvertArgs) -> Result<Arc<dyn TextRecognizer>> {
    use scanbook_document::scan::ocr::OcrConfig;

    match args.engine {
        Engine::Tesseract => Ok(Arc::new(tesseract(config)?)),
        Engine::Ocrs => {
            let models = args
                .model_dir
                .as_deref()
                .map(OcrConfig::from_dir)
                .unwrap_or_default();
            Ok(Arc::new(scanbook_document::OcrsRecognizer::new(models)?))
        }
    }
}

fn summary(outcome: &RunOutcome) -> String {
    let report = &outcome.report;
    let mut out = format!(
        "Processed {} file(s) in {:.1}s: {} succeeded, {} failed\n",
        report.total,
        report.elapsed_secs(),
        report.succeeded,
        report.failed
    );
    for failure in &report.failures {
        out.push_str(&format!("  failed: {}: {}\n", failure.input.display(), failure.reason));
    }
    out.push_str(&format!("Book: {}\n", outcome.book_dir.display()));
    out.push_str(&format!("Report: {}\n", outcome.report_path.display()));
    out
}

/// Print a verdict per file. Exits with failure if any file is rejected.
fn validate(config_path: Option<&Path>, files: &[PathBuf]) -> Result<ExitCode> {
    let config = PipelineConfig::load(config_path)?;
    let validator = FileValidator::new(config.max_file_bytes);
    let (report, all_valid) = verdicts(&validator, files);
    print!("{report}");
    Ok(if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn verdicts(validator: &FileValidator, files: &[PathBuf]) -> (String, bool) {
    let mut out = String::new();
    let mut all_valid = true;
    for file in files {
        match validator.check(file) {
            Ok(input) => out.push_str(&format!(
                "valid     {} ({:?}, {} bytes)\n",
                file.display(),
                input.format,
                input.byte_size
            )),
            Err(err) => {
                all_valid = false;
                out.push_str(&format!("rejected  {}\n", err));
            }
        }
    }
    (out, all_valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clap::CommandFactory;
    use scanbook_core::types::{BatchReport, ConversionResult};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn convert_flags_parse() {
        let cli = Cli::try_parse_from([
            "scanbook",
            "convert",
            "scans",
            "--recursive",
            "--threads",
            "8",
            "--no-save-images",
            "--config",
            "pipeline.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("pipeline.json")));
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        assert_eq!(args.input, PathBuf::from("scans"));
        assert!(args.recursive);
        assert_eq!(args.threads, Some(8));

        let mut config = PipelineConfig::default();
        apply_flags(&mut config, &args);
        assert_eq!(config.ocr_threads, 8);
        assert!(!config.save_processed_images);
    }

    #[test]
    fn validate_requires_files() {
        assert!(Cli::try_parse_from(["scanbook", "validate"]).is_err());
    }

    #[test]
    fn verdicts_report_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page_1.png");
        std::fs::write(&page, b"0123456789").unwrap();
        let notes = dir.path().join("notes.docx");
        std::fs::write(&notes, b"x").unwrap();

        let (out, all_valid) = verdicts(&FileValidator::default(), &[page.clone(), notes]);
        assert!(!all_valid);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("valid"));
        assert!(lines[0].contains("10 bytes"));
        assert!(lines[1].starts_with("rejected"));
        assert!(lines[1].contains("unsupported extension"));

        let (_, all_valid) = verdicts(&FileValidator::new(5), &[page]);
        assert!(!all_valid);
    }

    #[test]
    fn summary_lists_failures() {
        let results = vec![
            ConversionResult::success(0, "a.png".into(), "a.md".into(), Vec::new()),
            ConversionResult::failure(1, "b.png".into(), "OCR failed: blank"),
        ];
        let outcome = RunOutcome {
            report: BatchReport::from_results(&results, Utc::now()),
            results,
            book_dir: PathBuf::from("out/book"),
            report_path: PathBuf::from("out/conversion-report.json"),
        };
        let text = summary(&outcome);
        assert!(text.starts_with("Processed 2 file(s) in "));
        assert!(text.contains("1 succeeded, 1 failed"));
        assert!(text.contains("  failed: b.png: OCR failed: blank\n"));
        assert!(text.ends_with("Report: out/conversion-report.json\n"));
    }
}

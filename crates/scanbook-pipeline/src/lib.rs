// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanbook-pipeline: Conversion orchestration for Scanbook.
//
// Discovers input files, converts them on a bounded worker pool (page
// preparation followed by text structuring), and assembles the successful
// results into an mdBook-compatible corpus.

pub mod assemble;
pub mod batch;
pub mod discover;
pub mod report;

pub use assemble::BookAssembler;
pub use batch::{Converter, Orchestrator, PIPELINE_FAULT_TAG, RunOutcome};
pub use discover::{WorkUnit, discover, plan_units};
pub use report::{REPORT_FILE_NAME, write_report};

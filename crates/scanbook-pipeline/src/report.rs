// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persisted batch report.

use std::path::{Path, PathBuf};

use scanbook_core::error::Result;
use scanbook_core::types::BatchReport;
use tracing::debug;

pub const REPORT_FILE_NAME: &str = "conversion-report.json";

/// Write `report` as pretty JSON to `<dir>/conversion-report.json`.
pub fn write_report(report: &BatchReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(REPORT_FILE_NAME);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    debug!(path = %path.display(), "Batch report written");
    Ok(path)
}

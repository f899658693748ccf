// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input discovery and work planning.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use scanbook_core::error::{Result, ScanbookError};
use scanbook_core::naming::{safe_file_name, safe_file_name_with_extension};
use scanbook_core::types::PageFormat;
use scanbook_document::fingerprint::short_digest;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

/// One input file scheduled for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// Position in discovery order.
    pub sequence: usize,
    pub input: PathBuf,
    /// Markdown file stem for this input, unique within the run.
    pub name: String,
}

/// List eligible files under `input`.
///
/// A file path yields itself when its extension is allowed. A directory
/// yields its direct children, or its whole subtree when `recursive` is set.
/// The listing is a snapshot sorted in natural order (`page_2` before
/// `page_10`); unreadable entries are logged and skipped.
#[instrument(skip_all, fields(path = %input.display(), recursive))]
pub fn discover(input: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(input).map_err(|err| {
        ScanbookError::InvalidInput(format!("{}: {}", input.display(), err))
    })?;

    if metadata.is_file() {
        return match PageFormat::from_path(input) {
            Some(_) => Ok(vec![input.to_path_buf()]),
            None => Err(ScanbookError::InvalidInput(format!(
                "{}: unsupported file type",
                input.display()
            ))),
        };
    }

    let walker = WalkDir::new(input).min_depth(1);
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut paths: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| PageFormat::from_path(path).is_some())
        .collect();

    paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    info!(files = paths.len(), "Inputs discovered");
    Ok(paths)
}

/// Assign sequence numbers and unique markdown stems.
///
/// Inputs that would land on the same markdown file (same name in different
/// directories, the same name with different extensions, or a stem that
/// already ends in `.md`) get a short hash of their path appended, so no two
/// workers ever write the same markdown file.
pub fn plan_units(paths: Vec<PathBuf>) -> Vec<WorkUnit> {
    let stems: Vec<String> = paths.iter().map(|path| unit_stem(path)).collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(markdown_key(stem)).or_default() += 1;
    }

    paths
        .into_iter()
        .zip(stems)
        .enumerate()
        .map(|(sequence, (input, stem))| {
            let name = if counts[&markdown_key(&stem)] > 1 {
                let digest = short_digest(input.to_string_lossy().as_bytes(), 8);
                format!("{stem}_{digest}")
            } else {
                stem
            };
            WorkUnit {
                sequence,
                input,
                name,
            }
        })
        .collect()
}

/// The markdown file a stem is written to, case-folded for case-insensitive
/// filesystems.
fn markdown_key(stem: &str) -> String {
    safe_file_name_with_extension(stem, "md").to_lowercase()
}

fn unit_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| safe_file_name(&stem.to_string_lossy()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "page".to_string())
}

/// Compare strings treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks(a);
    let mut right = Chunks(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (is_digits(x), is_digits(y)) {
                    (true, true) => {
                        let (xt, yt) = (x.trim_start_matches('0'), y.trim_start_matches('0'));
                        xt.len().cmp(&yt.len()).then_with(|| xt.cmp(yt))
                    }
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn is_digits(chunk: &str) -> bool {
    chunk.starts_with(|ch: char| ch.is_ascii_digit())
}

/// Alternating runs of digits and non-digits.
struct Chunks<'a>(&'a str);

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.0.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .0
            .find(|ch: char| ch.is_ascii_digit() != digits)
            .unwrap_or(self.0.len());
        let (chunk, rest) = self.0.split_at(end);
        self.0 = rest;
        Some(chunk)
    }
}

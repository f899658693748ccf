// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document structure inference: a single left-to-right scan over sanitised
// lines, driven by a two-state machine.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::sanitize::ENTITY;

/// A first line shorter than this (in characters) is the document title.
pub const TITLE_MAX_CHARS: usize = 100;

/// Heading candidates are shorter than this (in characters).
pub const HEADING_MAX_CHARS: usize = 80;

static NUMBERED_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.").expect("numbered heading pattern should compile"));

static CHAPTER_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Chapter [0-9]+").expect("chapter heading pattern should compile")
});

static FIGURE_CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Figure|Fig\.)\s+[0-9]+[.:]\s*(.*?)(?:\.|$)")
        .expect("figure caption pattern should compile")
});

static TABLE_CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Table)\s+[0-9]+[.:]\s*(.*?)(?:\.|$)")
        .expect("table caption pattern should compile")
});

/// A heading and the content lines that followed it, joined by blank lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub heading: String,
    pub content: String,
}

impl Chapter {
    pub fn new(heading: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
        }
    }
}

/// Inferred outline of one source unit. All sequences are in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub title: Option<String>,
    pub headings: Vec<String>,
    pub chapters: Vec<Chapter>,
    /// Lines not under any heading: front matter before the first heading.
    pub paragraphs: Vec<String>,
    pub figures: Vec<String>,
    pub tables: Vec<String>,
}

/// Upper-case in the `str.isupper` sense: at least one cased character and
/// no lower-case ones. Character entities (`&amp;`) are ignored.
pub(crate) fn is_all_upper(text: &str) -> bool {
    let mut has_upper = false;
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some(entity) = ENTITY.find(rest) {
                rest = &rest[entity.end()..];
                continue;
            }
        }
        if ch.is_lowercase() {
            return false;
        }
        has_upper |= ch.is_uppercase();
        rest = &rest[ch.len_utf8()..];
    }
    has_upper
}

pub(crate) fn is_numbered_heading(line: &str) -> bool {
    NUMBERED_HEADING.is_match(line)
}

pub(crate) fn is_chapter_label(line: &str) -> bool {
    CHAPTER_HEADING.is_match(line)
}

/// Whether a trimmed line opens a new chapter: shorter than
/// [`HEADING_MAX_CHARS`] and all upper-case, numbered (`3. Baroque`), or
/// chapter-labelled (`Chapter 4 ...`, any case).
///
/// The rule has known false positives: any short all-caps line qualifies.
///
/// ```
/// use scanbook_text::is_heading_candidate;
///
/// assert!(is_heading_candidate("CHAPTER 1"));
/// assert!(is_heading_candidate("2. Gothic Cathedrals"));
/// assert!(is_heading_candidate("chapter 12: the modern era"));
/// // Emphasis in running text misfires.
/// assert!(is_heading_candidate("STOP."));
/// assert!(!is_heading_candidate("The nave is long."));
/// ```
pub fn is_heading_candidate(line: &str) -> bool {
    !line.is_empty()
        && line.chars().count() < HEADING_MAX_CHARS
        && (is_all_upper(line) || is_numbered_heading(line) || is_chapter_label(line))
}

/// Scanner position relative to the headings seen so far.
#[derive(Debug)]
enum ScanState {
    BeforeFirstHeading,
    InChapter { heading: String },
}

/// Accumulates lines and flushes them on every heading.
struct Scanner {
    state: ScanState,
    section: Vec<String>,
    structure: DocumentStructure,
}

impl Scanner {
    fn new(title: Option<String>) -> Self {
        Self {
            state: ScanState::BeforeFirstHeading,
            section: Vec::new(),
            structure: DocumentStructure {
                title,
                ..DocumentStructure::default()
            },
        }
    }

    fn feed(&mut self, line: &str) {
        if is_heading_candidate(line) {
            self.flush();
            self.structure.headings.push(line.to_string());
            self.state = ScanState::InChapter {
                heading: line.to_string(),
            };
        } else {
            self.section.push(line.to_string());
        }
    }

    /// Close the open section: chapter content if a heading is open,
    /// otherwise front-matter paragraphs.
    fn flush(&mut self) {
        let lines = std::mem::take(&mut self.section);
        match &self.state {
            ScanState::BeforeFirstHeading => self.structure.paragraphs.extend(lines),
            ScanState::InChapter { heading } => self
                .structure
                .chapters
                .push(Chapter::new(heading.clone(), lines.join("\n\n"))),
        }
    }

    fn finish(mut self) -> DocumentStructure {
        self.flush();
        self.structure
    }
}

fn captures(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Infer the outline of sanitised text.
///
/// The first line becomes the title when shorter than [`TITLE_MAX_CHARS`],
/// even if it looks like a heading, and is then excluded from the scan.
/// Figure and table captions are collected from the whole text.
#[instrument(skip_all, fields(chars = text.len()))]
pub fn infer_structure(text: &str) -> DocumentStructure {
    let mut lines = text.split('\n').peekable();

    let title = lines
        .next_if(|first| first.chars().count() < TITLE_MAX_CHARS)
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map(str::to_string);

    let mut scanner = Scanner::new(title);
    for line in lines.map(str::trim).filter(|line| !line.is_empty()) {
        scanner.feed(line);
    }
    let mut structure = scanner.finish();

    structure.figures = captures(&FIGURE_CAPTION, text);
    structure.tables = captures(&TABLE_CAPTION, text);

    debug!(
        title = structure.title.is_some(),
        headings = structure.headings.len(),
        chapters = structure.chapters.len(),
        paragraphs = structure.paragraphs.len(),
        figures = structure.figures.len(),
        tables = structure.tables.len(),
        "Structure inferred"
    );
    structure
}

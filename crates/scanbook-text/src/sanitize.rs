// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sanitisation of raw recognition output: control-character removal,
// recognition-error substitutions, markup escaping, whitespace normalisation.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use scanbook_core::error::{Result, ScanbookError};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use unicode_general_category::{GeneralCategory, get_general_category};

/// A character entity already present in the text (`&amp;`, `&#39;`, `&#x27;`).
pub(crate) static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:[A-Za-z][A-Za-z0-9]*|#[0-9]+|#[xX][0-9A-Fa-f]+);")
        .expect("entity pattern should compile")
});

// ============================================================================
// Substitution table
// ============================================================================

/// Ordered find/replace pairs for known recognition artifacts.
///
/// Pairs apply in order, each to the output of the previous one. The default
/// table targets English typography and common Latin-script character merges;
/// load another per language or source with [`SubstitutionTable::from_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionTable {
    pairs: Vec<(String, String)>,
}

impl Default for SubstitutionTable {
    fn default() -> Self {
        Self::new([
            // Typography
            ("''", "\""),
            ("``", "\""),
            ("\u{2014}", "-"),
            ("\u{2013}", "-"),
            // Character merges
            ("rn", "m"),
            ("cl", "d"),
            ("I-l", "H"),
        ])
    }
}

impl SubstitutionTable {
    pub fn new<I, F, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (F, T)>,
        F: Into<String>,
        T: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(from, to)| (from.into(), to.into()))
            .filter(|(from, _)| !from.is_empty())
            .collect();
        Self { pairs }
    }

    /// A table that changes nothing.
    pub fn empty() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Parse a JSON object of `"from": "to"` pairs, kept in file order.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let object: Map<String, Value> = serde_json::from_str(json)?;
        let mut pairs = Vec::with_capacity(object.len());
        for (from, to) in object {
            let Value::String(to) = to else {
                return Err(ScanbookError::Config(format!(
                    "substitution for {from:?} must be a string"
                )));
            };
            pairs.push((from, to));
        }
        Ok(Self::new(pairs))
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|err| {
            ScanbookError::Config(format!(
                "cannot read substitution table {}: {}",
                path.display(),
                err
            ))
        })?;
        let table = Self::from_json_str(&json)?;
        debug!(pairs = table.len(), "Substitution table loaded");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(from, to)| (from.as_str(), to.as_str()))
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (from, to) in &self.pairs {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        out
    }
}

// ============================================================================
// Sanitizer
// ============================================================================

/// Cleans recognised text while keeping its line structure.
///
/// Steps, in order:
///
/// 1. tabs become spaces, then every other character in a Unicode `C*`
///    category (control, format, private use, surrogate, unassigned) is
///    removed; `\n` is kept
/// 2. the substitution table is applied
/// 3. `<`, `>`, `"`, `'` and bare `&` are escaped as HTML entities
/// 4. whitespace runs inside a line collapse to one space, lines are trimmed,
///    runs of blank lines collapse to one, leading and trailing blank lines
///    are dropped
///
/// `sanitize(sanitize(s)) == sanitize(s)` for the default table.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    substitutions: SubstitutionTable,
}

impl Sanitizer {
    pub fn new(substitutions: SubstitutionTable) -> Self {
        Self { substitutions }
    }

    pub fn substitutions(&self) -> &SubstitutionTable {
        &self.substitutions
    }

    pub fn sanitize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let printable = strip_control(text);
        let corrected = self.substitutions.apply(&printable);
        let escaped = escape_markup(&corrected);
        normalize_whitespace(&escaped)
    }
}

fn is_control(ch: char) -> bool {
    matches!(
        get_general_category(ch),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::PrivateUse
            | GeneralCategory::Surrogate
            | GeneralCategory::Unassigned
    )
}

fn strip_control(text: &str) -> String {
    text.chars()
        .filter_map(|ch| match ch {
            '\n' => Some('\n'),
            '\t' => Some(' '),
            ch if is_control(ch) => None,
            ch => Some(ch),
        })
        .collect()
}

/// HTML-escape `text`, leaving existing character entities intact.
fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (idx, ch) in text.char_indices() {
        match ch {
            '&' if ENTITY.is_match(&text[idx..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            ch => out.push(ch),
        }
    }
    out
}

fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true;
    for line in text.split('\n') {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        let blank = collapsed.is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        lines.push(collapsed);
    }
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

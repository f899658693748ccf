// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markdown rendering of a `DocumentStructure`.

use std::sync::LazyLock;

use regex::Regex;

use crate::sanitize::ENTITY;
use crate::structure::{DocumentStructure, is_all_upper, is_numbered_heading};

static CHAPTER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Chapter").expect("chapter prefix pattern should compile"));

static INLINE_FIGURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Figure|Fig\.)\s+([0-9]+)[.:]\s*(.*?)(?:\.|$)")
        .expect("inline figure pattern should compile")
});

static INLINE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Table)\s+([0-9]+)[.:]\s*(.*?)(?:\.|$)")
        .expect("inline table pattern should compile")
});

/// Title-case like Python's `str.title`: a cased character following
/// another cased character is lowered, every other one is raised. Character
/// entities pass through untouched.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_cased = false;
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some(entity) = ENTITY.find(rest) {
                out.push_str(entity.as_str());
                rest = &rest[entity.end()..];
                previous_cased = false;
                continue;
            }
        }
        let cased = ch.is_uppercase() || ch.is_lowercase();
        if previous_cased {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        previous_cased = cased;
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Markdown heading line for a chapter heading.
fn heading_line(heading: &str) -> String {
    if CHAPTER_PREFIX.is_match(heading) {
        format!("## {heading}\n")
    } else if is_numbered_heading(heading) {
        format!("### {heading}\n")
    } else if is_all_upper(heading) {
        format!("### {}\n", title_case(heading))
    } else {
        format!("### {heading}\n")
    }
}

/// Rewrite inline `Figure N: caption.` / `Table N: caption.` occurrences as
/// bold labels.
fn emphasize_captions(markdown: &str) -> String {
    let figures = INLINE_FIGURE.replace_all(markdown, "**Figure ${2}:** ${3}");
    INLINE_TABLE
        .replace_all(&figures, "**Table ${2}:** ${3}")
        .into_owned()
}

/// Render `structure` as markdown.
///
/// The title becomes a level-1 heading. Chapter-labelled headings render at
/// level 2, all others at level 3, with all-caps headings title-cased. Front
/// matter paragraphs follow the chapters.
pub fn render(structure: &DocumentStructure) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(title) = &structure.title {
        parts.push(format!("# {title}\n"));
    }

    for chapter in &structure.chapters {
        parts.push(heading_line(&chapter.heading));
        if !chapter.content.is_empty() {
            parts.push(chapter.content.clone());
        }
        parts.push("\n".to_string());
    }

    if !structure.paragraphs.is_empty() {
        parts.push(structure.paragraphs.join("\n\n"));
    }

    emphasize_captions(&parts.join("\n\n"))
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text structuring entry point: sanitise, infer structure, render, persist.

use std::path::{Path, PathBuf};

use scanbook_core::config::PipelineConfig;
use scanbook_core::error::{Result, ScanbookError};
use scanbook_core::naming::safe_file_name_with_extension;
use tracing::{info, instrument};

use crate::render::render;
use crate::sanitize::{Sanitizer, SubstitutionTable};
use crate::structure::{DocumentStructure, infer_structure};

/// Rendered markdown for one unit and where it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOutput {
    pub markdown: String,
    pub path: PathBuf,
    pub structure: DocumentStructure,
}

/// Converts raw recognised text into markdown files under one directory.
#[derive(Debug, Clone)]
pub struct TextStructurer {
    sanitizer: Sanitizer,
    output_dir: PathBuf,
}

impl TextStructurer {
    pub fn new(output_dir: impl Into<PathBuf>, substitutions: SubstitutionTable) -> Self {
        Self {
            sanitizer: Sanitizer::new(substitutions),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig, substitutions: SubstitutionTable) -> Self {
        Self::new(config.markdown_output_dir.clone(), substitutions)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Sanitise, structure and render without touching the filesystem.
    pub fn to_markdown(&self, text: &str) -> (String, DocumentStructure) {
        let clean = self.sanitizer.sanitize(text);
        let structure = infer_structure(&clean);
        (render(&structure), structure)
    }

    /// Render `text` and write it to `<output_dir>/<safe name>.md`.
    ///
    /// The only error is a failure to write the file.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub fn process(&self, text: &str, name: &str) -> Result<MarkdownOutput> {
        let (markdown, structure) = self.to_markdown(text);

        let path = self
            .output_dir
            .join(safe_file_name_with_extension(name, "md"));
        std::fs::create_dir_all(&self.output_dir)
            .and_then(|()| std::fs::write(&path, &markdown))
            .map_err(|err| {
                ScanbookError::Io(std::io::Error::new(
                    err.kind(),
                    format!("failed to write {}: {}", path.display(), err),
                ))
            })?;

        info!(path = %path.display(), chapters = structure.chapters.len(), "Markdown saved");
        Ok(MarkdownOutput {
            markdown,
            path,
            structure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_markdown_under_a_safe_name() {
        let dir = tempfile::tempdir().unwrap();
        let structurer = TextStructurer::new(dir.path().join("md"), SubstitutionTable::default());

        let raw = "ART HISTORY\n\nCHAPTER 1\nThis is paragraph one.\n\nCHAPTER 2\nThis is paragraph two.";
        let output = structurer.process(raw, "../page 01").unwrap();

        assert_eq!(output.path, dir.path().join("md").join(".._page_01.md"));
        assert_eq!(std::fs::read_to_string(&output.path).unwrap(), output.markdown);
        assert!(output.markdown.starts_with("# ART HISTORY\n"));
        assert!(output.markdown.contains("## CHAPTER 1\n"));
        assert_eq!(output.structure.headings, vec!["CHAPTER 1", "CHAPTER 2"]);
    }

    #[test]
    fn sanitisation_runs_before_structuring() {
        let structurer = TextStructurer::new("unused", SubstitutionTable::default());
        let (markdown, structure) = structurer.to_markdown("\u{FEFF}Title\n\t<b>rnosaic</b>");
        assert_eq!(structure.title.as_deref(), Some("Title"));
        assert_eq!(structure.paragraphs, vec!["&lt;b&gt;mosaic&lt;/b&gt;"]);
        assert!(!markdown.contains('<'));
    }

    #[test]
    fn empty_text_still_produces_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let structurer = TextStructurer::new(dir.path(), SubstitutionTable::default());
        let output = structurer.process("", "blank_page").unwrap();
        assert_eq!(output.markdown, "");
        assert!(output.path.exists());
    }

    #[test]
    fn unwritable_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();
        let structurer = TextStructurer::new(&blocker, SubstitutionTable::default());
        let err = structurer.process("Some text", "page").unwrap_err();
        assert!(matches!(err, ScanbookError::Io(_)));
    }
}

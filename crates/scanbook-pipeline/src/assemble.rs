// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Book assembly: turns successful conversion results into an
// mdBook-compatible directory tree.
//
// Layout of `<book_output_dir>/<title-slug>/`:
//
//   book.toml              (kept if present)
//   src/README.md          (kept if present)
//   src/SUMMARY.md         (always regenerated)
//   src/chapter_NN_<stem>.md
//   src/glossary.md        (kept if present)
//   src/references.md      (kept if present)
//
// The tree is built in a sibling staging directory and swapped in with
// renames, so readers never observe a half-written book.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use scanbook_core::config::{BookMetadata, PipelineConfig};
use scanbook_core::error::{Result, ScanbookError};
use scanbook_core::types::ConversionResult;
use scanbook_text::render::title_case;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

const CONTENT_DIR: &str = "src";
const SUMMARY_FILE: &str = "SUMMARY.md";
const CHAPTER_PREFIX: &str = "chapter_";

static LEADING_POSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+ ").expect("position pattern should compile"));

/// `book.toml` contents.
#[derive(Debug, Serialize)]
struct BookToml<'a> {
    book: BookSection<'a>,
}

#[derive(Debug, Serialize)]
struct BookSection<'a> {
    title: &'a str,
    authors: Vec<&'a str>,
    description: &'a str,
    language: &'a str,
}

/// Writes the assembled corpus. The only writer of its output tree.
#[derive(Debug, Clone)]
pub struct BookAssembler {
    output_dir: PathBuf,
    metadata: BookMetadata,
}

impl BookAssembler {
    pub fn new(output_dir: impl Into<PathBuf>, metadata: BookMetadata) -> Self {
        Self {
            output_dir: output_dir.into(),
            metadata,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.book_output_dir.clone(), config.book())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn metadata(&self) -> &BookMetadata {
        &self.metadata
    }

    /// Final location of the book: `<output_dir>/<title-slug>`.
    pub fn book_dir(&self) -> PathBuf {
        self.output_dir.join(slugify(&self.metadata.title))
    }

    /// Assemble the book from `results` and return its root.
    ///
    /// Successful results become chapters numbered from 1 in the order they
    /// appear in `results`; failures are skipped. With no successes the book
    /// holds only its scaffold. Either the whole new tree replaces the old
    /// one, or the call fails with [`ScanbookError::Assembly`] and the old
    /// tree is untouched.
    #[instrument(skip_all, fields(results = results.len(), title = %self.metadata.title))]
    pub fn assemble(&self, results: &[ConversionResult]) -> Result<PathBuf> {
        let book_dir = self.book_dir();
        let slug = slugify(&self.metadata.title);
        let run = Uuid::new_v4().simple().to_string();
        let staging = self.output_dir.join(format!(".{slug}.tmp-{run}"));

        let built = std::fs::create_dir_all(&self.output_dir)
            .map_err(|err| assembly_error("create output directory", &self.output_dir, err))
            .and_then(|()| self.build(&staging, &book_dir, results));

        let chapters = match built {
            Ok(chapters) => chapters,
            Err(err) => {
                discard(&staging);
                return Err(err);
            }
        };

        if let Err(err) = swap_into_place(&staging, &book_dir, &slug, &run) {
            discard(&staging);
            return Err(err);
        }

        if chapters == 0 {
            warn!(book = %book_dir.display(), "No successful conversions; book contains only its scaffold");
        } else {
            info!(book = %book_dir.display(), chapters, "Book assembled");
        }
        Ok(book_dir)
    }

    /// Populate `staging` and return the number of chapters written.
    fn build(&self, staging: &Path, book_dir: &Path, results: &[ConversionResult]) -> Result<usize> {
        let content = staging.join(CONTENT_DIR);
        std::fs::create_dir_all(&content)
            .map_err(|err| assembly_error("create staging directory", &content, err))?;

        if book_dir.exists() {
            copy_previous_tree(book_dir, staging)?;
        }

        let chapter_files = self.write_chapters(&content, results)?;
        self.write_scaffold(staging, &content, &chapter_files)?;
        Ok(chapter_files.len())
    }

    fn write_chapters(&self, content: &Path, results: &[ConversionResult]) -> Result<Vec<String>> {
        let mut chapter_files = Vec::new();
        for markdown in results.iter().filter_map(ConversionResult::markdown) {
            let stem = markdown
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file_name = format!("{CHAPTER_PREFIX}{:02}_{stem}.md", chapter_files.len() + 1);
            let target = content.join(&file_name);

            std::fs::copy(markdown, &target)
                .map_err(|err| assembly_error("copy chapter", markdown, err))?;
            debug!(from = %markdown.display(), to = %target.display(), "Chapter copied");
            chapter_files.push(file_name);
        }
        Ok(chapter_files)
    }

    fn write_scaffold(&self, root: &Path, content: &Path, chapter_files: &[String]) -> Result<()> {
        let BookMetadata {
            title,
            author,
            description,
        } = &self.metadata;

        let book_toml = toml::to_string(&BookToml {
            book: BookSection {
                title,
                authors: vec![author.as_str()],
                description,
                language: "en",
            },
        })
        .map_err(|err| ScanbookError::Assembly(format!("cannot serialise book.toml: {}", err)))?;
        write_if_absent(&root.join("book.toml"), &book_toml)?;

        write_file(&content.join(SUMMARY_FILE), &summary(chapter_files))?;

        let readme = format!(
            "# {title}\n\n{description}\n\n\
             Welcome to the online edition of this textbook. \
             Use the navigation panel on the left to browse chapters.\n"
        );
        write_if_absent(&content.join("README.md"), &readme)?;

        for (file, heading) in [("glossary.md", "Glossary"), ("references.md", "References")] {
            write_if_absent(
                &content.join(file),
                &format!("# {heading}\n\nThis section is under development.\n"),
            )?;
        }
        Ok(())
    }
}

/// Table of contents: introduction, one entry per chapter, then the fixed
/// glossary and references entries.
fn summary(chapter_files: &[String]) -> String {
    let mut summary = String::from("# Summary\n\n[Introduction](README.md)\n\n");
    for file in chapter_files {
        summary.push_str(&format!("- [{}]({file})\n", chapter_display_name(file)));
    }
    summary.push_str("\n[Glossary](glossary.md)\n[References](references.md)\n");
    summary
}

/// `chapter_03_page_12.md` becomes `Page 12`.
pub fn chapter_display_name(file_name: &str) -> String {
    let stem = file_name.strip_suffix(".md").unwrap_or(file_name);
    let spaced = title_case(&stem.replace(CHAPTER_PREFIX, "").replace('_', " "));
    LEADING_POSITION.replace(&spaced, "").into_owned()
}

/// Lower-case ASCII slug for directory names; `book` when nothing is left.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("book");
    }
    slug
}

/// Copy the current book into `staging`, leaving out generated chapters and
/// the table of contents. Hand-edited files survive a rebuild.
fn copy_previous_tree(book_dir: &Path, staging: &Path) -> Result<()> {
    for entry in WalkDir::new(book_dir).min_depth(1) {
        let entry = entry.map_err(|err| {
            ScanbookError::Assembly(format!("cannot read {}: {}", book_dir.display(), err))
        })?;
        let relative = entry
            .path()
            .strip_prefix(book_dir)
            .map_err(|err| ScanbookError::Assembly(err.to_string()))?;
        if is_generated(relative) {
            continue;
        }

        let target = staging.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|err| assembly_error("create directory", &target, err))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)
                .map_err(|err| assembly_error("copy", entry.path(), err))?;
        }
    }
    Ok(())
}

fn is_generated(relative: &Path) -> bool {
    let mut components = relative.components();
    let (Some(dir), Some(file), None) = (components.next(), components.next(), components.next())
    else {
        return false;
    };
    if dir.as_os_str() != CONTENT_DIR {
        return false;
    }
    let file = file.as_os_str().to_string_lossy();
    file == SUMMARY_FILE || (file.starts_with(CHAPTER_PREFIX) && file.ends_with(".md"))
}

/// Replace `book_dir` with `staging`. On failure the previous tree is put
/// back.
fn swap_into_place(staging: &Path, book_dir: &Path, slug: &str, run: &str) -> Result<()> {
    let parent = book_dir.parent().unwrap_or_else(|| Path::new("."));
    let previous = parent.join(format!(".{slug}.old-{run}"));
    let had_previous = book_dir.exists();

    if had_previous {
        std::fs::rename(book_dir, &previous)
            .map_err(|err| assembly_error("move aside", book_dir, err))?;
    }

    if let Err(err) = std::fs::rename(staging, book_dir) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&previous, book_dir) {
                warn!(error = %restore, backup = %previous.display(), "Could not restore previous book");
            }
        }
        return Err(assembly_error("move into place", book_dir, err));
    }

    if had_previous {
        if let Err(err) = std::fs::remove_dir_all(&previous) {
            warn!(error = %err, path = %previous.display(), "Could not remove previous book");
        }
    }
    Ok(())
}

fn discard(staging: &Path) {
    if staging.exists() {
        if let Err(err) = std::fs::remove_dir_all(staging) {
            warn!(error = %err, path = %staging.display(), "Could not remove staging directory");
        }
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|err| assembly_error("write", path, err))
}

fn write_if_absent(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    write_file(path, contents)
}

fn assembly_error(action: &str, path: &Path, err: std::io::Error) -> ScanbookError {
    ScanbookError::Assembly(format!("cannot {} {}: {}", action, path.display(), err))
}

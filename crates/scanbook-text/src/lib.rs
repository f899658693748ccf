// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanbook-text: Text structuring for the Scanbook pipeline.
//
// Cleans raw recognition output, infers a document outline (title, headings,
// chapters, paragraphs, figure and table captions) with a line-based state
// machine, and renders the outline to markdown.

pub mod processor;
pub mod render;
pub mod sanitize;
pub mod structure;

pub use processor::{MarkdownOutput, TextStructurer};
pub use render::render;
pub use sanitize::{Sanitizer, SubstitutionTable};
pub use structure::{Chapter, DocumentStructure, infer_structure, is_heading_candidate};

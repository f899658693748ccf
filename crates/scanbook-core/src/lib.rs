// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanbook: Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use config::{BookMetadata, PipelineConfig};
pub use error::ScanbookError;
pub use types::*;

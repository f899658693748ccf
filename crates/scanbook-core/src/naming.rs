// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem-safe names derived from untrusted input names.

/// Replace every character that is not a word character, `-`, or `.` with
/// `_`. Path separators never survive, so the result is a single component.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// [`safe_file_name`] with the extension forced to `ext` (no leading dot).
pub fn safe_file_name_with_extension(name: &str, ext: &str) -> String {
    let mut safe = safe_file_name(name);
    let suffix = format!(".{ext}");
    if !safe.ends_with(&suffix) {
        safe.push_str(&suffix);
    }
    safe
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content fingerprints: SHA-256 digests used to derive collision-resistant
// artifact names.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// The first `len` hex characters of the SHA-256 of `data`.
pub fn short_digest(data: &[u8], len: usize) -> String {
    let mut digest = hash_bytes(data);
    digest.truncate(len.min(digest.len()));
    digest
}

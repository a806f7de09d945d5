//! Content hashing for rule ids and justification keys.
//!
//! All identities in the justification graph are 128-bit content hashes
//! over canonical string encodings: SHA-256 truncated to 16 bytes,
//! rendered as 32 lowercase hex characters. Sets are sorted before
//! hashing so the same support facts always produce the same key.

use crate::value::Fact;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Hash arbitrary text to a 32-character hex string.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(32);
    for byte in &digest[..16] {
        // infallible on String
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Hash a single fact by its canonical encoding.
pub fn fact_hash(fact: &Fact) -> String {
    content_hash(&fact.canonical())
}

/// Hash a set of support facts. The input is sorted internally, so any
/// iteration order produces the same key.
pub fn fact_set_hash<'a>(facts: impl IntoIterator<Item = &'a Fact>) -> String {
    let mut encodings: Vec<String> = facts.into_iter().map(Fact::canonical).collect();
    encodings.sort();
    content_hash(&encodings.join("\n"))
}

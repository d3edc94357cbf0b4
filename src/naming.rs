//! Reversible, filesystem-safe entry names.
//!
//! `name` → `urlsafe-base64(utf8(name)) + ".enc"`. The URL-safe alphabet has
//! no path separators, so any Unicode filename maps to a single flat entry.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};

use crate::error::{VaultError, VaultResult};

/// Suffix of every encrypted entry file
pub const ENTRY_SUFFIX: &str = ".enc";

/// Encode an original filename into its on-disk entry name
pub fn encode_name(original: &str) -> String {
    let mut encoded = URL_SAFE.encode(original.as_bytes());
    encoded.push_str(ENTRY_SUFFIX);
    encoded
}

/// Recover the original filename from an entry name
pub fn decode_name(entry: &str) -> VaultResult<String> {
    let stem = entry
        .strip_suffix(ENTRY_SUFFIX)
        .ok_or_else(|| VaultError::Integrity(format!("entry {} lacks {} suffix", entry, ENTRY_SUFFIX)))?;

    let bytes = URL_SAFE
        .decode(stem)
        .map_err(|e| VaultError::Integrity(format!("entry {} is not a valid encoded name: {}", entry, e)))?;

    String::from_utf8(bytes)
        .map_err(|_| VaultError::Integrity(format!("entry {} does not decode to UTF-8", entry)))
}

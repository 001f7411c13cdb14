//! 32-bit FNV-1a hashing and hash literal handling.

use crate::error::{Error, Result};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Compute the 32-bit FNV-1a hash of `text` over its UTF-8 bytes.
///
/// ```
/// assert_eq!(spore_registry::compute_hash(""), 0x811c9dc5);
/// assert_eq!(spore_registry::compute_hash("sporemaster"), 0xFF13FBD8);
/// ```
pub fn compute_hash(text: &str) -> u32 {
    text.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Render a hash the way unresolved names are shown, e.g. `0x0000ABCD`.
pub fn hex(hash: u32) -> String {
    format!("0x{hash:08X}")
}

/// Parse a hexadecimal hash with an optional `0x`, `0X` or `#` prefix.
pub fn parse_hash_literal(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix('#'))
        .unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidHash(text.to_owned()));
    }

    u32::from_str_radix(digits, 16).map_err(|_| Error::InvalidHash(text.to_owned()))
}

/// Like [`parse_hash_literal`] but only for text carrying an explicit `0x` or `#` prefix.
pub(crate) fn prefixed_hash_literal(text: &str) -> Option<u32> {
    let prefixed = text.starts_with("0x") || text.starts_with("0X") || text.starts_with('#');
    prefixed.then(|| parse_hash_literal(text).ok()).flatten()
}

//! Byte counts with binary unit suffixes.

use crate::{Error, Result};

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Parse a byte count such as `4096`, `4k`, `10M` or `2g`.
///
/// Suffixes are powers of 1024 and case-insensitive. Zero is rejected:
/// every size the benchmark takes must be positive.
///
/// # Errors
///
/// Returns [`Error::Config`] for bad syntax, zero, or overflow.
pub fn parse_size(size: &str) -> Result<u64> {
    let size = size.trim();
    let (digits, multiplier) = match size.char_indices().last() {
        Some((idx, 'k' | 'K')) => (&size[..idx], KIB),
        Some((idx, 'm' | 'M')) => (&size[..idx], MIB),
        Some((idx, 'g' | 'G')) => (&size[..idx], GIB),
        _ => (size, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Config(format!("bad syntax of numeric argument: {size:?}")));
    }
    let number: u64 = digits
        .parse()
        .map_err(|_| Error::Config(format!("numeric argument out of range: {size}")))?;
    let bytes = number
        .checked_mul(multiplier)
        .ok_or_else(|| Error::Config(format!("numeric argument out of range: {size}")))?;
    if bytes == 0 {
        return Err(Error::Config(format!("numeric argument out of range: {size}")));
    }
    Ok(bytes)
}

/// Parse a byte offset. Like [`parse_size`], but a plain `0` is allowed.
///
/// # Errors
///
/// Returns [`Error::Config`] for bad syntax or overflow.
pub fn parse_offset(offset: &str) -> Result<u64> {
    if offset.trim() == "0" {
        return Ok(0);
    }
    parse_size(offset)
}

/// Format bytes as a short human-readable string.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.1}G", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1}M", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1}K", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes}B")
    }
}

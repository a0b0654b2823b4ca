//! Human-readable size parsing.

use anyhow::{anyhow, Result};

/// Unit suffixes and their multipliers.
///
/// Bare letters are binary, as in `50K`.
const UNITS: &[(&str, u64)] = &[
    ("B", 1),
    ("K", 1024),
    ("KIB", 1024),
    ("M", 1024 * 1024),
    ("MIB", 1024 * 1024),
    ("KB", 1000),
    ("MB", 1000 * 1000),
];

/// Parses a size like `50KiB`, `64K`, `1.5MB` or `4096` into bytes.
pub fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim();

    if let Ok(n) = s.parse::<usize>() {
        return Ok(n);
    }

    let split_pos = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| anyhow!("Invalid size: {:?}", s))?;

    let (num_str, unit) = s.split_at(split_pos);
    let num: f64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in size: {:?}", num_str))?;

    let unit = unit.trim().to_uppercase();
    let multiplier = UNITS
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, multiplier)| *multiplier)
        .ok_or_else(|| anyhow!("Unknown unit {:?}. Supported: B, KB, MB, KiB, MiB", unit))?;

    Ok((num * multiplier as f64) as usize)
}

/// Parses a chunk size, which must hold at least one byte.
pub fn parse_chunk_size(s: &str) -> Result<usize> {
    match parse_size(s)? {
        0 => Err(anyhow!("Chunk size must be positive")),
        size => Ok(size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("50K").unwrap(), 51_200);
        assert_eq!(parse_size("50KiB").unwrap(), 51_200);
        assert_eq!(parse_size("50kb").unwrap(), 50_000);
        assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
        assert_eq!(parse_size("2 MiB").unwrap(), 2_097_152);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("10GB").is_err());
        assert!(parse_size("1.2.3K").is_err());
    }

    #[test]
    fn test_parse_chunk_size() {
        assert_eq!(parse_chunk_size("1").unwrap(), 1);
        assert!(parse_chunk_size("0").is_err());
        assert!(parse_chunk_size("0KB").is_err());
    }
}

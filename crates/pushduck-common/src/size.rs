//! Human-readable file size notation.
//!
//! Schema constraints accept sizes as strings like `"5MB"` or `"512KB"`.
//! Units are 1024-based; the integer prefix is required, the unit is
//! case-insensitive and `B` may be omitted entirely for raw byte counts.

use thiserror::Error;

/// Bytes per kibibyte; all units are powers of this.
const KB: u64 = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("Invalid size literal: {0:?}")]
    Invalid(String),

    #[error("Unknown size unit: {0:?} (expected B, KB, MB, GB or TB)")]
    UnknownUnit(String),
}

/// Parse a size literal like `"5MB"`, `"512 KB"` or `"1024"` into bytes.
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let trimmed = input.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(digits_end);

    let value: u64 = digits
        .parse()
        .map_err(|_| SizeParseError::Invalid(input.to_string()))?;

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => KB,
        "MB" => KB * KB,
        "GB" => KB * KB * KB,
        "TB" => KB * KB * KB * KB,
        other => return Err(SizeParseError::UnknownUnit(other.to_string())),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::Invalid(input.to_string()))
}

/// Format a byte count in the same notation `parse_size` accepts.
///
/// Picks the largest unit that divides the value exactly, falling back to a
/// one-decimal representation for sizes that sit between units. Used for
/// validation messages ("File exceeds 5MB").
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[(u64, &str)] = &[
        (KB * KB * KB * KB, "TB"),
        (KB * KB * KB, "GB"),
        (KB * KB, "MB"),
        (KB, "KB"),
    ];

    for &(factor, unit) in UNITS {
        if bytes >= factor {
            if bytes % factor == 0 {
                return format!("{}{}", bytes / factor, unit);
            }
            return format!("{:.1}{}", bytes as f64 / factor as f64, unit);
        }
    }
    format!("{bytes}B")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1024"), Ok(1024));
        assert_eq!(parse_size("100B"), Ok(100));
        assert_eq!(parse_size("5KB"), Ok(5 * 1024));
        assert_eq!(parse_size("5MB"), Ok(5 * 1024 * 1024));
        assert_eq!(parse_size("2GB"), Ok(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("1TB"), Ok(1024u64.pow(4)));
    }

    #[test]
    fn test_parse_size_is_case_insensitive_and_trims() {
        assert_eq!(parse_size("5mb"), Ok(5 * 1024 * 1024));
        assert_eq!(parse_size(" 512 kb "), Ok(512 * 1024));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(matches!(parse_size("MB"), Err(SizeParseError::Invalid(_))));
        assert!(matches!(parse_size(""), Err(SizeParseError::Invalid(_))));
        assert!(matches!(
            parse_size("5.5MB"),
            Err(SizeParseError::UnknownUnit(_))
        ));
        assert!(matches!(
            parse_size("10XB"),
            Err(SizeParseError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_format_size_round_trips_exact_values() {
        assert_eq!(format_size(5 * 1024 * 1024), "5MB");
        assert_eq!(format_size(512 * 1024), "512KB");
        assert_eq!(format_size(100), "100B");
        assert_eq!(format_size(3 * 1024u64.pow(3)), "3GB");
    }

    #[test]
    fn test_format_size_inexact_values() {
        assert_eq!(format_size(1536), "1.5KB");
    }
}

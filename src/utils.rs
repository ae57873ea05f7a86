//! Utility functions for the IPTV parser
//!
//! - `utils::time` for XMLTV timestamp normalization and display timezones
//! - `utils::decompression` for opening (possibly gzipped) source files

pub mod decompression;
pub mod time;

pub use decompression::{open_source, CompressionFormat, DecompressionService, SourceReader};
pub use time::{normalize_timestamp, Precision, XmltvTimestamp};

/// Trim a string and treat an empty result as absent
pub fn non_empty_trimmed(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_trimmed() {
        assert_eq!(non_empty_trimmed("  News  "), Some("News".to_string()));
        assert_eq!(non_empty_trimmed(" \n\t "), None);
        assert_eq!(non_empty_trimmed(""), None);
    }
}

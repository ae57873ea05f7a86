//! Error type definitions for the IPTV parser
//!
//! This module defines all error types used throughout the crate. The XMLTV
//! walker keeps its own error enum so callers can tell a malformed document
//! apart from an unreadable one; everything else funnels into [`AppError`].

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the application.
/// It uses `thiserror` to provide automatic error trait implementations and
/// proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// XMLTV guide parsing errors
    #[error("XMLTV error: {0}")]
    Xmltv(#[from] XmltvError),

    /// M3U playlist parsing errors
    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    /// Output file errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Filesystem errors outside the parsers
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while walking an XMLTV document
///
/// Only document-level failures live here. A bad timestamp or a missing
/// child element never produces an `XmltvError`; those fields are simply
/// absent on the emitted record.
#[derive(Error, Debug)]
pub enum XmltvError {
    /// The outermost element is not `<tv>`
    #[error("Expected root element <{expected}>, found <{found}>")]
    UnexpectedRoot { expected: String, found: String },

    /// The document contains no element at all
    #[error("Document has no root element (expected <{expected}>)")]
    MissingRoot { expected: String },

    /// The document ended while elements were still open
    #[error("Text before the root element at byte {position}")]
    TextBeforeRoot { position: u64 },

    #[error("Content after the root element at byte {position}")]
    TrailingContent { position: u64 },

    #[error("Document ended inside <{element}>")]
    Truncated { element: String },

    /// The reader could not tokenize the markup
    #[error("Malformed XML at byte {position}: {source}")]
    Markup {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// Element names and character data must be UTF-8
    #[error("Invalid UTF-8 in {context}: {source}")]
    Encoding {
        context: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    /// The source could not be opened or read
    #[error("Failed to read {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while reading an M3U playlist
#[derive(Error, Debug)]
pub enum PlaylistError {
    /// The playlist could not be opened or read
    #[error("Failed to read {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by the table writers and readers
#[derive(Error, Debug)]
pub enum OutputError {
    /// Unknown or missing file extension
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    /// JSON encoding or decoding failures
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding or decoding failures
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet encoding or decoding failures
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow batch assembly failures
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Records whose shape cannot be stored as flat columns
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// Filesystem failures on the output path
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a not found error for a specific resource
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl XmltvError {
    /// Create a root mismatch error
    pub fn unexpected_root<E: Into<String>, F: Into<String>>(expected: E, found: F) -> Self {
        Self::UnexpectedRoot {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a resource error for the named source
    pub fn io<S: Into<String>>(source_name: S, source: io::Error) -> Self {
        Self::Io {
            source_name: source_name.into(),
            source,
        }
    }

    /// Wrap a reader error, separating I/O failures from markup failures
    pub fn from_reader<S: Into<String>>(source_name: S, position: u64, err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(shared) => {
                let source = Arc::try_unwrap(shared)
                    .unwrap_or_else(|shared| io::Error::new(shared.kind(), shared.to_string()));
                Self::io(source_name, source)
            }
            other => Self::Markup {
                position,
                source: other,
            },
        }
    }

    /// True for errors about the document's shape, false for resource errors
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

impl PlaylistError {
    /// Create a resource error for the named playlist
    pub fn io<S: Into<String>>(source_name: S, source: io::Error) -> Self {
        Self::Io {
            source_name: source_name.into(),
            source,
        }
    }
}

impl OutputError {
    /// Create a filesystem error for the given path
    pub fn io<P: Into<String>>(path: P, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

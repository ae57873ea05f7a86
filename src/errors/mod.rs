//! Centralized error handling for the IPTV parser
//!
//! # Error Categories
//!
//! - **XMLTV Errors**: structural problems with a guide document, or an
//!   unreadable source. Field-level problems are never errors.
//! - **Playlist Errors**: unreadable M3U sources
//! - **Output Errors**: table encoding and filesystem failures
//! - **Configuration Errors**: bad config values or missing input tables
//!
//! # Usage
//!
//! ```rust
//! use iptv_parser::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("no programs table"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for XMLTV walker Results
pub type XmltvResult<T> = Result<T, XmltvError>;

/// Convenience type alias for output Results
pub type OutputResult<T> = Result<T, OutputError>;

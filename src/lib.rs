//! Streaming XMLTV guide and M3U playlist parsing
//!
//! Sources are read incrementally and turned into flat records that can be
//! written as JSON, JSON Lines, CSV or Parquet tables and served over a small
//! read-only HTTP API.

pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod output;
pub mod services;
pub mod utils;
pub mod web;

//! Service layer
//!
//! Read-only views over parsed tables, shared by the web handlers.

pub mod catalog;

pub use catalog::{Catalog, CategoryView, ProgramView};

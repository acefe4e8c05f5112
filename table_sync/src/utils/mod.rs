//! Utilities for table_sync
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{
    levenshtein, name_similarity, normalize_table_name, quote_ident, strip_client_prefix,
};

//! Schema module for table_sync
//!
//! This module handles catalog scanning, hierarchy classification and field
//! comparison.

pub mod compare;
pub mod hierarchy;
pub mod scanner;
pub mod types;

// Re-export key types
pub use compare::compare_fields;
pub use hierarchy::{Hierarchy, HierarchyClassifier, HierarchyLevel};
pub use scanner::{Catalog, MySqlCatalog, SchemaScanner, TableEntry};
pub use types::{ColumnInfo, CommonField, FieldCompareResult, TableInfo};

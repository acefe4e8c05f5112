//! Type definitions for scanned tables and columns

use serde::{Deserialize, Serialize};

use crate::schema::hierarchy::{Hierarchy, HierarchyClassifier, HierarchyLevel};

/// Represents a scanned table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnInfo>,
    /// Catalog estimate, not an exact count
    pub row_count: u64,
    pub is_client_side: bool,
    pub hierarchy: Hierarchy,
}

impl TableInfo {
    /// Create a table with no columns, classifying its name
    pub fn new(name: &str, classifier: &HierarchyClassifier, is_client_side: bool) -> Self {
        Self {
            name: name.to_string(),
            comment: None,
            columns: Vec::new(),
            row_count: 0,
            is_client_side,
            hierarchy: classifier.classify(name),
        }
    }

    /// Append a column, keeping ordinal positions strictly increasing
    pub fn add_column(&mut self, mut column: ColumnInfo) {
        let last = self.columns.last().map(|c| c.ordinal_position).unwrap_or(0);
        if column.ordinal_position <= last {
            column.ordinal_position = last + 1;
        }
        self.columns.push(column);
    }

    /// Builder-style [`TableInfo::add_column`]
    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.add_column(column);
        self
    }

    pub fn level(&self) -> HierarchyLevel {
        self.hierarchy.level
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary-key columns in ordinal order
    pub fn primary_key(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.is_primary_key)
    }
}

/// Represents a scanned column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Base type, e.g. `varchar`
    pub data_type: String,
    /// Full declaration, e.g. `varchar(64)` or `int(10) unsigned`
    pub column_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub comment: Option<String>,
    pub is_primary_key: bool,
    pub ordinal_position: u32,
}

impl ColumnInfo {
    /// Create a new column with the given name and base type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_lowercase(),
            column_type: data_type.to_lowercase(),
            nullable: true,
            default_value: None,
            comment: None,
            is_primary_key: false,
            ordinal_position: 0,
        }
    }

    /// Set the full type declaration
    pub fn column_type(mut self, column_type: &str) -> Self {
        self.column_type = column_type.to_lowercase();
        self
    }

    /// Mark the column as part of the primary key
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Declared character length for `char`/`varchar`/`binary`/`varbinary`
    pub fn declared_length(&self) -> Option<u64> {
        if !matches!(
            self.data_type.as_str(),
            "char" | "varchar" | "binary" | "varbinary"
        ) {
            return None;
        }
        let open = self.column_type.find('(')?;
        let close = self.column_type[open..].find(')')? + open;
        self.column_type[open + 1..close].trim().parse().ok()
    }

    pub fn is_unsigned(&self) -> bool {
        self.column_type.contains("unsigned")
    }
}

/// A column present on both sides of a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonField {
    pub name: String,
    pub left: ColumnInfo,
    pub right: ColumnInfo,
}

/// Disjoint split of two tables' columns by exact name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldCompareResult {
    pub common: Vec<CommonField>,
    pub left_only: Vec<ColumnInfo>,
    pub right_only: Vec<ColumnInfo>,
}

impl FieldCompareResult {
    pub fn common_names(&self) -> Vec<String> {
        self.common.iter().map(|f| f.name.clone()).collect()
    }
}

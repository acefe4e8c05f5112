//! Row values moved between tables
//!
//! Values are compared through a type-insensitive textual form, so an `int`
//! key on one side matches a `bigint unsigned` or `varchar` key on the other.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// One column value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Canonical text used for key lookups and change detection
    pub fn key_repr(&self) -> String {
        match self {
            SqlValue::Null => "\u{0}NULL".to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::UInt(v) => v.to_string(),
            SqlValue::Float(v) => v.to_string(),
            SqlValue::Text(v) => v.clone(),
            SqlValue::Bytes(v) => {
                let mut hex = String::with_capacity(2 + v.len() * 2);
                hex.push_str("0x");
                for byte in v {
                    hex.push_str(&format!("{:02x}", byte));
                }
                hex
            }
        }
    }

    /// Same value for sync purposes
    pub fn same_as(&self, other: &SqlValue) -> bool {
        self.key_repr() == other.key_repr()
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

/// Column name -> value, in projection order
pub type Row = IndexMap<String, SqlValue>;

/// Identity of a row: the canonical text of its key values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowKey(Vec<String>);

impl RowKey {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a SqlValue>) -> Self {
        RowKey(values.into_iter().map(SqlValue::key_repr).collect())
    }

    /// Key over `columns`; `None` if a column is missing or NULL
    pub fn from_row(row: &Row, columns: &[String]) -> Option<Self> {
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            match row.get(column) {
                Some(value) if !value.is_null() => parts.push(value.key_repr()),
                _ => return None,
            }
        }
        Some(RowKey(parts))
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

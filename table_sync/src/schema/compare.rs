//! Pairwise field comparison
//!
//! Splits the columns of two tables into common, left-only and right-only
//! sets. Matching uses it for field evidence, sync uses it for the copied
//! projection.

use std::collections::HashMap;

use crate::schema::types::{ColumnInfo, CommonField, FieldCompareResult, TableInfo};

/// Compare the columns of two tables by case-sensitive name.
///
/// Common fields keep the left table's column order.
pub fn compare_fields(left: &TableInfo, right: &TableInfo) -> FieldCompareResult {
    let right_columns: HashMap<&str, &ColumnInfo> = right
        .columns
        .iter()
        .map(|col| (col.name.as_str(), col))
        .collect();

    let mut result = FieldCompareResult::default();

    for col in &left.columns {
        match right_columns.get(col.name.as_str()) {
            Some(other) => result.common.push(CommonField {
                name: col.name.clone(),
                left: col.clone(),
                right: (*other).clone(),
            }),
            None => result.left_only.push(col.clone()),
        }
    }

    result.right_only = right
        .columns
        .iter()
        .filter(|col| !left.has_column(&col.name))
        .cloned()
        .collect();

    result
}

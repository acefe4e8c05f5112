//! Row-level sync planning
//!
//! Works on rows already fetched from both tables and decides, per source
//! row, whether it is inserted, updated, left unchanged or skipped, plus which
//! target rows a full sync deletes. Nothing here touches the database, so the
//! write path only ever executes a finished plan.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::sync::types::SyncMode;
use crate::sync::value::{Row, RowKey, SqlValue};

/// Row warnings kept verbatim before they are summarized
pub const MAX_ROW_WARNINGS: usize = 50;

/// How source and target rows are paired
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KeyStrategy {
    /// Rows with equal values in these columns are the same row
    Columns(Vec<String>),
    /// Rows are paired by position inside their `group`; target rows are
    /// addressed through `locator`, which holds a column the source lacks
    GroupOrdinal { group: Vec<String>, locator: Vec<String> },
}

impl KeyStrategy {
    /// Columns identifying a source row
    pub fn source_columns(&self) -> &[String] {
        match self {
            KeyStrategy::Columns(columns) => columns,
            KeyStrategy::GroupOrdinal { group, .. } => group,
        }
    }

    /// Columns addressing a target row in `UPDATE`/`DELETE`
    pub fn target_locator(&self) -> &[String] {
        match self {
            KeyStrategy::Columns(columns) => columns,
            KeyStrategy::GroupOrdinal { locator, .. } => locator,
        }
    }
}

/// Source parent key -> target parent key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryKeyMapping {
    entries: HashMap<RowKey, Vec<SqlValue>>,
}

impl PrimaryKeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: RowKey, target: Vec<SqlValue>) {
        self.entries.insert(source, target);
    }

    pub fn get(&self, source: &RowKey) -> Option<&[SqlValue]> {
        self.entries.get(source).map(Vec::as_slice)
    }

    /// Translate a single-column foreign-key value
    pub fn translate(&self, value: &SqlValue) -> Option<&SqlValue> {
        match self.get(&RowKey::from_values([value])) {
            Some([single]) => Some(single),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Foreign-key column rewritten through the parent mapping
#[derive(Debug, Clone, Copy)]
pub struct ForeignKeyTranslation<'a> {
    pub column: &'a str,
    pub mapping: &'a PrimaryKeyMapping,
}

/// One target row to update
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    /// Values addressing the target row
    pub locator: Row,
    /// Changed columns only
    pub values: Row,
}

/// Everything a sync call will write
#[derive(Debug, Clone, Default)]
pub struct RowSyncPlan {
    pub inserts: Vec<Row>,
    pub updates: Vec<RowUpdate>,
    /// Locators of target rows to delete
    pub deletes: Vec<Row>,
    pub unchanged: u64,
    pub skipped: u64,
    pub warnings: Vec<String>,
    suppressed_warnings: usize,
}

impl RowSyncPlan {
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    fn skip(&mut self, warning: Option<String>) {
        self.skipped += 1;
        if let Some(warning) = warning {
            self.warn(warning);
        }
    }

    fn warn(&mut self, warning: String) {
        if self.warnings.len() < MAX_ROW_WARNINGS {
            self.warnings.push(warning);
        } else {
            self.suppressed_warnings += 1;
        }
    }

    fn finish(mut self) -> Self {
        if self.suppressed_warnings > 0 {
            self.warnings
                .push(format!("{} further row warnings suppressed", self.suppressed_warnings));
        }
        self
    }
}

/// Plan the row sync of `source` into `target`.
///
/// Rows whose key contains NULL, and rows whose foreign key has no mapping
/// entry, are skipped with a warning. Rows whose values already equal the
/// target are counted unchanged, so replanning after applying a plan yields
/// a no-op.
pub fn plan_row_sync(
    source: &[Row],
    target: &[Row],
    key: &KeyStrategy,
    mode: SyncMode,
    foreign_key: Option<ForeignKeyTranslation<'_>>,
) -> RowSyncPlan {
    let mut plan = RowSyncPlan::default();
    let mut keyed: IndexMap<RowKey, Vec<Row>> = IndexMap::new();

    for (position, row) in source.iter().enumerate() {
        let row = match translate_foreign_key(row, foreign_key) {
            Ok(row) => row,
            Err(warning) => {
                plan.skip(Some(format!("source row {}: {}", position + 1, warning)));
                continue;
            }
        };

        let Some(row_key) = RowKey::from_row(&row, key.source_columns()) else {
            plan.skip(Some(format!("source row {}: NULL or missing key value", position + 1)));
            continue;
        };

        let group = keyed.entry(row_key.clone()).or_default();
        if matches!(key, KeyStrategy::Columns(_)) && !group.is_empty() {
            plan.skip(Some(format!("source row {}: duplicate key {}", position + 1, row_key)));
            continue;
        }
        group.push(row);
    }

    match key {
        KeyStrategy::Columns(columns) => plan_by_columns(&mut plan, keyed, target, columns, mode),
        KeyStrategy::GroupOrdinal { group, locator } => {
            plan_by_group(&mut plan, keyed, target, group, locator, mode)
        }
    }

    plan.finish()
}

fn plan_by_columns(
    plan: &mut RowSyncPlan,
    source: IndexMap<RowKey, Vec<Row>>,
    target: &[Row],
    columns: &[String],
    mode: SyncMode,
) {
    let mut target_index: HashMap<RowKey, &Row> = HashMap::new();
    for row in target {
        if let Some(row_key) = RowKey::from_row(row, columns) {
            if target_index.contains_key(&row_key) {
                plan.warn(format!("target has duplicate key {}, first row wins", row_key));
                continue;
            }
            target_index.insert(row_key, row);
        }
    }

    for (row_key, rows) in &source {
        for row in rows {
            reconcile(plan, row, target_index.get(row_key).copied(), columns, mode);
        }
    }

    if mode.deletes_orphans() {
        for row in target {
            let orphan = RowKey::from_row(row, columns).map_or(true, |k| !source.contains_key(&k));
            if orphan {
                plan.deletes.push(locator_of(row, columns));
            }
        }
    }
}

fn plan_by_group(
    plan: &mut RowSyncPlan,
    source: IndexMap<RowKey, Vec<Row>>,
    target: &[Row],
    group: &[String],
    locator: &[String],
    mode: SyncMode,
) {
    let mut target_groups: HashMap<RowKey, Vec<&Row>> = HashMap::new();
    for row in target {
        match RowKey::from_row(row, locator) {
            Some(_) => {
                if let Some(group_key) = RowKey::from_row(row, group) {
                    target_groups.entry(group_key).or_default().push(row);
                } else if mode.deletes_orphans() {
                    plan.deletes.push(locator_of(row, locator));
                }
            }
            None => plan.warn("target row without locator value cannot be addressed".to_string()),
        }
    }

    for (group_key, rows) in &source {
        let existing = target_groups.get(group_key).map(Vec::as_slice).unwrap_or(&[]);
        for (i, row) in rows.iter().enumerate() {
            reconcile(plan, row, existing.get(i).copied(), locator, mode);
        }
    }

    if mode.deletes_orphans() {
        for (group_key, rows) in &target_groups {
            let kept = source.get(group_key).map_or(0, Vec::len);
            for row in rows.iter().skip(kept) {
                plan.deletes.push(locator_of(row, locator));
            }
        }
    }
}

/// Decide the fate of one source row against its target counterpart
fn reconcile(
    plan: &mut RowSyncPlan,
    row: &Row,
    existing: Option<&Row>,
    locator: &[String],
    mode: SyncMode,
) {
    match existing {
        None if mode.allows_insert() => plan.inserts.push(row.clone()),
        None => plan.skip(None),
        Some(_) if !mode.allows_update() => plan.skip(None),
        Some(current) => {
            let values: Row = row
                .iter()
                .filter(|(column, _)| !locator.contains(*column))
                .filter(|(column, value)| current.get(*column).map_or(true, |v| !v.same_as(value)))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect();

            if values.is_empty() {
                plan.unchanged += 1;
            } else {
                plan.updates.push(RowUpdate {
                    locator: locator_of(current, locator),
                    values,
                });
            }
        }
    }
}

fn locator_of(row: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(SqlValue::Null)))
        .collect()
}

fn translate_foreign_key(
    row: &Row,
    foreign_key: Option<ForeignKeyTranslation<'_>>,
) -> std::result::Result<Row, String> {
    let Some(fk) = foreign_key else {
        return Ok(row.clone());
    };

    let value = row
        .get(fk.column)
        .filter(|v| !v.is_null())
        .ok_or_else(|| format!("NULL foreign key {}", fk.column))?;
    let mapped = fk
        .mapping
        .translate(value)
        .ok_or_else(|| format!("no parent mapping for {} = {}", fk.column, value.key_repr()))?;

    let mut translated = row.clone();
    translated.insert(fk.column.to_string(), mapped.clone());
    Ok(translated)
}

/// Inner join of two key sets on equal values, column by column.
///
/// Every source key present in the target maps to the target row's own key
/// values. Empty when either key is empty or the key widths differ.
pub fn map_primary_keys(
    source: &[Row],
    source_key: &[String],
    target: &[Row],
    target_key: &[String],
) -> PrimaryKeyMapping {
    let mut mapping = PrimaryKeyMapping::new();
    if source_key.is_empty() || source_key.len() != target_key.len() {
        return mapping;
    }

    let targets: HashMap<RowKey, Vec<SqlValue>> = target
        .iter()
        .filter_map(|row| {
            let key = RowKey::from_row(row, target_key)?;
            let values = target_key
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(SqlValue::Null))
                .collect();
            Some((key, values))
        })
        .collect();

    for row in source {
        if let Some(key) = RowKey::from_row(row, source_key) {
            if let Some(values) = targets.get(&key) {
                mapping.insert(key, values.clone());
            }
        }
    }
    mapping
}

/// Key set of a row collection, for reporting and verification
pub fn key_set(rows: &[Row], columns: &[String]) -> HashSet<RowKey> {
    rows.iter().filter_map(|r| RowKey::from_row(r, columns)).collect()
}

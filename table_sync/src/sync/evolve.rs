//! Target schema evolution and key derivation
//!
//! The target schema only ever grows: character columns are widened and key
//! columns may be created, but data columns are never added or dropped.
//! Everything here is computed from scanned metadata; the engine executes the
//! resulting statements.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::schema::hierarchy::HierarchyClassifier;
use crate::schema::types::{ColumnInfo, TableInfo};
use crate::sync::plan::KeyStrategy;
use crate::utils::naming::{foreign_key_candidates, normalize_table_name, quote_ident, NESTING_DELIMITER};

/// Row-identity columns tried in child tables, in preference order
pub const ROW_IDENTITY_COLUMNS: &[&str] = &["id", "idx", "seq"];

/// Column created on child targets without a row-identity column
pub const CREATED_IDENTITY_COLUMN: &str = "idx";

/// One `MODIFY COLUMN` widening a character column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnWidening {
    pub column: String,
    pub from_type: String,
    pub to_type: String,
    pub statement: String,
}

/// Common columns whose target declaration is shorter than the source's.
///
/// Returns `(source column, target column)` pairs; the engine measures the
/// stored data of each before calling [`plan_widening`].
pub fn widening_candidates<'a>(
    source: &'a TableInfo,
    target: &'a TableInfo,
    columns: &[String],
) -> Vec<(&'a ColumnInfo, &'a ColumnInfo)> {
    columns
        .iter()
        .filter_map(|name| Some((source.column(name)?, target.column(name)?)))
        .filter(|(s, t)| s.data_type == t.data_type)
        .filter(|(s, t)| match (s.declared_length(), t.declared_length()) {
            (Some(source_len), Some(target_len)) => target_len < source_len,
            _ => false,
        })
        .collect()
}

/// Widen `target_column` to fit both the source declaration and the longest
/// value already stored on either side.
pub fn plan_widening(
    table: &str,
    source_column: &ColumnInfo,
    target_column: &ColumnInfo,
    observed_max: u64,
) -> Option<ColumnWidening> {
    let current = target_column.declared_length()?;
    let required = source_column.declared_length().unwrap_or(0).max(observed_max);
    if required <= current {
        return None;
    }

    let to_type = format!("{}({})", target_column.data_type, required);
    let mut statement = format!(
        "ALTER TABLE {} MODIFY COLUMN {} {}",
        quote_ident(table),
        quote_ident(&target_column.name),
        to_type
    );
    statement.push_str(if target_column.nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &target_column.default_value {
        statement.push_str(&format!(" DEFAULT {}", quote_literal(default)));
    }
    if let Some(comment) = target_column.comment.as_deref().filter(|c| !c.is_empty()) {
        statement.push_str(&format!(" COMMENT {}", quote_literal(comment)));
    }

    Some(ColumnWidening {
        column: target_column.name.clone(),
        from_type: target_column.column_type.clone(),
        to_type,
        statement,
    })
}

fn quote_literal(value: &str) -> String {
    if value.eq_ignore_ascii_case("null") {
        return "NULL".to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Key DDL applied to the target before rows are synced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KeyDdl {
    AddPrimaryKey(Vec<String>),
    /// Auto-increment `id` primary key
    AddIdColumn,
    /// Auto-increment `idx` row-identity column for a child table
    AddIdxColumn { foreign_key: String, with_primary_key: bool },
}

impl KeyDdl {
    pub fn statement(&self, table: &str) -> String {
        let table_ident = quote_ident(table);
        match self {
            KeyDdl::AddPrimaryKey(columns) => format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({})",
                table_ident,
                join_idents(columns)
            ),
            KeyDdl::AddIdColumn => format!(
                "ALTER TABLE {} ADD COLUMN {} BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY FIRST",
                table_ident,
                quote_ident("id")
            ),
            KeyDdl::AddIdxColumn {
                foreign_key,
                with_primary_key,
            } => {
                let idx = quote_ident(CREATED_IDENTITY_COLUMN);
                let mut statement = format!(
                    "ALTER TABLE {} ADD COLUMN {} BIGINT NOT NULL AUTO_INCREMENT, ADD UNIQUE KEY {} ({})",
                    table_ident,
                    idx,
                    quote_ident(&format!("uk_{}", CREATED_IDENTITY_COLUMN)),
                    idx
                );
                if *with_primary_key {
                    statement.push_str(&format!(
                        ", ADD PRIMARY KEY ({}, {})",
                        quote_ident(foreign_key),
                        idx
                    ));
                }
                statement
            }
        }
    }
}

fn join_idents(columns: &[String]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

/// How rows of a pair are keyed, and what DDL that needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPlan {
    pub strategy: KeyStrategy,
    pub ddl: Option<KeyDdl>,
    pub warnings: Vec<String>,
}

impl KeyPlan {
    fn columns(columns: Vec<String>) -> Self {
        Self {
            strategy: KeyStrategy::Columns(columns),
            ddl: None,
            warnings: Vec::new(),
        }
    }

    /// Key columns that must be present in the synced projection
    pub fn required_columns(&self) -> Vec<String> {
        self.strategy.source_columns().to_vec()
    }
}

/// Key for a root table pair.
///
/// The source must have a primary key. A target key must agree with it; a
/// target without one is keyed logically by the source's key columns, and
/// only gets real key DDL when `create_missing_keys` is set.
pub fn derive_main_key(source: &TableInfo, target: &TableInfo, create_missing_keys: bool) -> Result<KeyPlan> {
    let source_pk = source.primary_key();
    if source_pk.is_empty() {
        return Err(Error::precondition(&source.name, "source table has no primary key"));
    }

    let target_pk = target.primary_key();
    if !target_pk.is_empty() {
        if target_pk != source_pk {
            return Err(Error::precondition(
                &target.name,
                format!(
                    "primary keys disagree: source ({}) vs target ({})",
                    source_pk.join(", "),
                    target_pk.join(", ")
                ),
            ));
        }
        return Ok(KeyPlan::columns(source_pk));
    }

    if source_pk.iter().all(|c| target.has_column(c)) {
        let mut plan = KeyPlan::columns(source_pk.clone());
        if create_missing_keys {
            plan.ddl = Some(KeyDdl::AddPrimaryKey(source_pk));
        } else {
            plan.warnings.push(format!(
                "target has no primary key, rows are matched on ({}) without a constraint",
                source_pk.join(", ")
            ));
        }
        return Ok(plan);
    }

    if source_pk == ["id"] {
        if !create_missing_keys {
            return Err(Error::precondition(
                &target.name,
                "target lacks the id key column; enable create_missing_keys to add it",
            ));
        }
        let mut plan = KeyPlan::columns(source_pk);
        plan.ddl = Some(KeyDdl::AddIdColumn);
        return Ok(plan);
    }

    Err(Error::precondition(
        &target.name,
        format!("target lacks key columns ({})", source_pk.join(", ")),
    ))
}

/// Foreign-key column present on both sides of a child pair.
///
/// Candidates are derived from the last segment of the parent's
/// prefix-stripped name and tried in order.
pub fn infer_foreign_key(
    source: &TableInfo,
    target: &TableInfo,
    classifier: &HierarchyClassifier,
) -> Option<String> {
    let parent = source.hierarchy.parent_name.as_deref()?;
    let stripped = classifier.strip_prefix(parent);
    let segment = stripped.rsplit(NESTING_DELIMITER).next().unwrap_or(stripped);

    foreign_key_candidates(segment)
        .into_iter()
        .find(|candidate| source.has_column(candidate) && target.has_column(candidate))
}

/// Composite key for a child table pair: foreign key plus row identity.
pub fn derive_sub_table_key(
    source: &TableInfo,
    target: &TableInfo,
    foreign_key: &str,
    create_missing_keys: bool,
) -> Result<KeyPlan> {
    let identity = ROW_IDENTITY_COLUMNS
        .iter()
        .find(|c| source.has_column(c) && target.has_column(c));

    if let Some(identity) = identity {
        let columns = vec![foreign_key.to_string(), identity.to_string()];
        let mut plan = KeyPlan::columns(columns.clone());
        if !target.has_primary_key() {
            if create_missing_keys {
                plan.ddl = Some(KeyDdl::AddPrimaryKey(columns));
            } else {
                plan.warnings.push(format!(
                    "target has no primary key, rows are matched on ({}, {}) without a constraint",
                    foreign_key, identity
                ));
            }
        }
        return Ok(plan);
    }

    let group = vec![foreign_key.to_string()];
    let locator = vec![foreign_key.to_string(), CREATED_IDENTITY_COLUMN.to_string()];
    let strategy = KeyStrategy::GroupOrdinal { group, locator };

    if target.has_column(CREATED_IDENTITY_COLUMN) {
        return Ok(KeyPlan {
            strategy,
            ddl: None,
            warnings: Vec::new(),
        });
    }

    if !create_missing_keys {
        return Err(Error::precondition(
            &target.name,
            format!(
                "no common row identity column ({}); enable create_missing_keys to add {}",
                ROW_IDENTITY_COLUMNS.join("/"),
                CREATED_IDENTITY_COLUMN
            ),
        ));
    }

    Ok(KeyPlan {
        strategy,
        ddl: Some(KeyDdl::AddIdxColumn {
            foreign_key: foreign_key.to_string(),
            with_primary_key: !target.has_primary_key(),
        }),
        warnings: Vec::new(),
    })
}

/// A source child table and its target counterpart
#[derive(Debug, Clone)]
pub struct ChildPair {
    pub source: TableInfo,
    pub target: TableInfo,
}

/// Pair the children of two root tables by nesting suffix.
///
/// Exact suffix equality wins over normalized equality. Level-1 pairs come
/// before level-2 pairs so parents always sync first.
pub fn discover_child_pairs(
    source_root: &TableInfo,
    target_root: &TableInfo,
    all_tables: &[TableInfo],
) -> Vec<ChildPair> {
    let targets = children_of(target_root, all_tables);

    let mut pairs: Vec<ChildPair> = children_of(source_root, all_tables)
        .into_iter()
        .filter_map(|source| {
            let same_level = || targets.iter().filter(|t| t.level() == source.level());
            let suffix = &source.hierarchy.child_suffix;
            let normalized = normalize_table_name(suffix);

            let target = same_level()
                .find(|t| &t.hierarchy.child_suffix == suffix)
                .or_else(|| {
                    same_level().find(|t| {
                        normalize_table_name(&t.hierarchy.child_suffix) == normalized
                    })
                });

            match target {
                Some(target) => Some(ChildPair {
                    source: source.clone(),
                    target: (*target).clone(),
                }),
                None => {
                    tracing::debug!(child = %source.name, target_root = %target_root.name, "No counterpart for child table");
                    None
                }
            }
        })
        .collect();

    pairs.sort_by_key(|p| p.source.level());
    pairs
}

fn children_of<'a>(root: &TableInfo, all_tables: &'a [TableInfo]) -> Vec<&'a TableInfo> {
    all_tables
        .iter()
        .filter(|t| !t.level().is_root() && t.hierarchy.root_name == root.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(name: &str, pk: &[&str], columns: &[&str]) -> TableInfo {
        let classifier = HierarchyClassifier::default();
        let mut t = TableInfo::new(name, &classifier, classifier.has_client_prefix(name));
        for c in pk {
            t.add_column(ColumnInfo::new(c, "int").primary_key());
        }
        for c in columns {
            t.add_column(ColumnInfo::new(c, "varchar").column_type("varchar(32)"));
        }
        t
    }

    #[test]
    fn widening_uses_observed_length() {
        let source = table("client_item", &["id"], &[])
            .with_column(ColumnInfo::new("name", "varchar").column_type("varchar(64)"));
        let mut target = table("item", &["id"], &[]);
        let mut name = ColumnInfo::new("name", "varchar").column_type("varchar(16)").nullable(false);
        name.default_value = Some("it's".to_string());
        name.comment = Some("display name".to_string());
        target.add_column(name);

        let columns = vec!["id".to_string(), "name".to_string()];
        let candidates = widening_candidates(&source, &target, &columns);
        assert_eq!(candidates.len(), 1);

        let (s, t) = candidates[0];
        let widening = plan_widening("item", s, t, 100).unwrap();
        assert_eq!(widening.to_type, "varchar(100)");
        assert_eq!(
            widening.statement,
            "ALTER TABLE `item` MODIFY COLUMN `name` varchar(100) NOT NULL DEFAULT 'it''s' COMMENT 'display name'"
        );

        let widening = plan_widening("item", s, t, 10).unwrap();
        assert_eq!(widening.to_type, "varchar(64)");
    }

    #[test]
    fn different_base_types_are_never_widened() {
        let source = table("client_item", &[], &[])
            .with_column(ColumnInfo::new("code", "varchar").column_type("varchar(64)"));
        let target = table("item", &[], &[])
            .with_column(ColumnInfo::new("code", "char").column_type("char(8)"));
        assert!(widening_candidates(&source, &target, &["code".to_string()]).is_empty());
    }

    #[test]
    fn main_key_rules() {
        let source = table("client_item", &["id"], &["name"]);

        let plan = derive_main_key(&source, &table("item", &["id"], &["name"]), false).unwrap();
        assert_eq!(plan.strategy, KeyStrategy::Columns(vec!["id".to_string()]));
        assert!(plan.ddl.is_none());

        let err = derive_main_key(&source, &table("item", &["code"], &["id"]), false).unwrap_err();
        assert!(err.is_precondition());

        let keyless = table("item", &[], &["id", "name"]);
        let plan = derive_main_key(&source, &keyless, false).unwrap();
        assert!(plan.ddl.is_none());
        assert_eq!(plan.warnings.len(), 1);
        let plan = derive_main_key(&source, &keyless, true).unwrap();
        assert_eq!(plan.ddl, Some(KeyDdl::AddPrimaryKey(vec!["id".to_string()])));

        let no_id = table("item", &[], &["name"]);
        assert!(derive_main_key(&source, &no_id, false).unwrap_err().is_precondition());
        let plan = derive_main_key(&source, &no_id, true).unwrap();
        assert_eq!(plan.ddl, Some(KeyDdl::AddIdColumn));

        let no_pk = table("client_item", &[], &["id"]);
        assert!(derive_main_key(&no_pk, &keyless, true).unwrap_err().is_precondition());
    }

    #[test]
    fn foreign_key_from_parent_name() {
        let classifier = HierarchyClassifier::default();
        let source = table("client_items__drop", &[], &["items_id", "item_id", "rate"]);
        let target = table("item__drop", &[], &["item_id", "rate"]);
        assert_eq!(infer_foreign_key(&source, &target, &classifier), Some("item_id".to_string()));

        let source = table("client_item__drop__bonus", &[], &["dropId", "value"]);
        let target = table("item__drop__bonus", &[], &["dropId", "value"]);
        assert_eq!(infer_foreign_key(&source, &target, &classifier), Some("dropId".to_string()));

        let root = table("client_item", &[], &["item_id"]);
        assert_eq!(infer_foreign_key(&root, &root, &classifier), None);
    }

    #[test]
    fn sub_table_keys() {
        let source = table("client_item__drop", &[], &["item_id", "seq", "rate"]);
        let target = table("item__drop", &[], &["item_id", "seq", "rate"]);
        let plan = derive_sub_table_key(&source, &target, "item_id", true).unwrap();
        assert_eq!(
            plan.strategy,
            KeyStrategy::Columns(vec!["item_id".to_string(), "seq".to_string()])
        );
        assert_eq!(
            plan.ddl.unwrap().statement("item__drop"),
            "ALTER TABLE `item__drop` ADD PRIMARY KEY (`item_id`, `seq`)"
        );

        let source = table("client_item__drop", &[], &["item_id", "rate"]);
        let target = table("item__drop", &[], &["item_id", "rate"]);
        assert!(derive_sub_table_key(&source, &target, "item_id", false)
            .unwrap_err()
            .is_precondition());

        let plan = derive_sub_table_key(&source, &target, "item_id", true).unwrap();
        assert!(matches!(plan.strategy, KeyStrategy::GroupOrdinal { .. }));
        assert_eq!(
            plan.ddl.unwrap().statement("item__drop"),
            "ALTER TABLE `item__drop` ADD COLUMN `idx` BIGINT NOT NULL AUTO_INCREMENT, \
             ADD UNIQUE KEY `uk_idx` (`idx`), ADD PRIMARY KEY (`item_id`, `idx`)"
        );

        let with_idx = table("item__drop", &[], &["item_id", "rate", "idx"]);
        let plan = derive_sub_table_key(&source, &with_idx, "item_id", false).unwrap();
        assert!(plan.ddl.is_none());
    }

    #[test]
    fn children_pair_by_suffix_level_ordered() {
        let tables = vec![
            table("client_item", &["id"], &[]),
            table("client_item__drop__bonus", &[], &[]),
            table("client_item__drops", &[], &[]),
            table("client_item__cost", &[], &[]),
            table("client_skill__cost", &[], &[]),
            table("item", &["id"], &[]),
            table("item__drop", &[], &[]),
            table("item__drop__bonus", &[], &[]),
            table("item__cost", &[], &[]),
        ];

        let pairs = discover_child_pairs(&tables[0], &tables[5], &tables);
        let names: Vec<(&str, &str)> = pairs
            .iter()
            .map(|p| (p.source.name.as_str(), p.target.name.as_str()))
            .collect();

        assert_eq!(
            names,
            vec![
                ("client_item__drops", "item__drop"),
                ("client_item__cost", "item__cost"),
                ("client_item__drop__bonus", "item__drop__bonus"),
            ]
        );
    }
}

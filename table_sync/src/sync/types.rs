//! Sync options and report types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Row consistency policy for one sync call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Insert missing rows, update existing ones
    #[default]
    Incremental,
    UpdateOnly,
    InsertOnly,
    /// Incremental, then delete target rows absent from the source
    FullSync,
}

impl SyncMode {
    pub fn allows_insert(self) -> bool {
        matches!(self, SyncMode::Incremental | SyncMode::InsertOnly | SyncMode::FullSync)
    }

    pub fn allows_update(self) -> bool {
        matches!(self, SyncMode::Incremental | SyncMode::UpdateOnly | SyncMode::FullSync)
    }

    pub fn deletes_orphans(self) -> bool {
        self == SyncMode::FullSync
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncMode::Incremental => "incremental",
            SyncMode::UpdateOnly => "update_only",
            SyncMode::InsertOnly => "insert_only",
            SyncMode::FullSync => "full_sync",
        };
        f.write_str(label)
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "incremental" => Ok(SyncMode::Incremental),
            "update_only" | "update" => Ok(SyncMode::UpdateOnly),
            "insert_only" | "insert" => Ok(SyncMode::InsertOnly),
            "full_sync" | "full" => Ok(SyncMode::FullSync),
            other => Err(Error::ValidationError(format!("Unknown sync mode: {}", other))),
        }
    }
}

/// Audit columns left alone unless explicitly included
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &["created_at", "updated_at", "create_time", "update_time"];

/// Caller-supplied options for one sync call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub mode: SyncMode,
    pub backup_before_write: bool,
    /// Compute the full plan without writing anything
    pub dry_run: bool,
    pub batch_size: usize,
    /// When non-empty, only these fields (plus key columns) are copied
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    /// Allow schema changes that create keys on the target
    pub create_missing_keys: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            backup_before_write: false,
            dry_run: false,
            batch_size: 500,
            include_fields: Vec::new(),
            exclude_fields: DEFAULT_EXCLUDED_FIELDS.iter().map(|f| f.to_string()).collect(),
            create_missing_keys: false,
        }
    }
}

impl SyncOptions {
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether a non-key field is copied under the include/exclude lists
    pub fn field_selected(&self, field: &str) -> bool {
        if !self.include_fields.is_empty() && !self.include_fields.iter().any(|f| f == field) {
            return false;
        }
        !self.exclude_fields.iter().any(|f| f == field)
    }
}

/// Report of one table sync
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub source_table: String,
    pub target_table: String,
    pub mode: SyncMode,
    pub success: bool,
    pub dry_run: bool,
    /// DDL applied (or planned, on a dry run) to the target
    pub schema_updates: Vec<String>,
    pub inserted_rows: u64,
    pub updated_rows: u64,
    pub unchanged_rows: u64,
    pub skipped_rows: u64,
    pub deleted_rows: u64,
    pub elapsed_ms: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub backup_table: Option<String>,
}

impl SyncResult {
    pub fn new(source: &str, target: &str, mode: SyncMode) -> Self {
        Self {
            source_table: source.to_string(),
            target_table: target.to_string(),
            mode,
            ..Default::default()
        }
    }

    /// Report for a call that failed before or during the write
    pub fn failed(source: &str, target: &str, mode: SyncMode, error: &Error) -> Self {
        let mut result = Self::new(source, target, mode);
        result.errors.push(error.to_string());
        result
    }
}

/// Report of a root sync and its cascade into child tables
#[derive(Debug, Clone, Serialize)]
pub struct CascadeSyncResult {
    pub root: SyncResult,
    pub children: Vec<SyncResult>,
    pub success_count: usize,
    pub failure_count: usize,
    /// Root failed, children were not touched
    pub aborted: bool,
    pub elapsed_ms: u64,
}

impl CascadeSyncResult {
    pub fn new(root: SyncResult) -> Self {
        Self {
            aborted: !root.success,
            root,
            children: Vec::new(),
            success_count: 0,
            failure_count: 0,
            elapsed_ms: 0,
        }
    }

    pub fn push_child(&mut self, child: SyncResult) {
        if child.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.children.push(child);
    }

    pub fn is_success(&self) -> bool {
        self.root.success && self.failure_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_permissions() {
        assert!(SyncMode::Incremental.allows_insert() && SyncMode::Incremental.allows_update());
        assert!(!SyncMode::UpdateOnly.allows_insert());
        assert!(!SyncMode::InsertOnly.allows_update());
        assert!(SyncMode::FullSync.deletes_orphans());
        assert!(!SyncMode::Incremental.deletes_orphans());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("full-sync".parse::<SyncMode>().unwrap(), SyncMode::FullSync);
        assert_eq!("Insert_Only".parse::<SyncMode>().unwrap(), SyncMode::InsertOnly);
        assert_eq!(SyncMode::UpdateOnly.to_string(), "update_only");
        assert!("mirror".parse::<SyncMode>().is_err());
    }

    #[test]
    fn field_selection() {
        let options = SyncOptions::default();
        assert!(options.field_selected("name"));
        assert!(!options.field_selected("updated_at"));

        let options = SyncOptions {
            include_fields: vec!["name".into()],
            ..SyncOptions::default()
        };
        assert!(options.field_selected("name"));
        assert!(!options.field_selected("desc"));
    }

    #[test]
    fn cascade_counts() {
        let mut root = SyncResult::new("client_item", "item", SyncMode::Incremental);
        root.success = true;
        let mut cascade = CascadeSyncResult::new(root);
        assert!(!cascade.aborted);

        let mut ok = SyncResult::new("client_item__drop", "item__drop", SyncMode::Incremental);
        ok.success = true;
        cascade.push_child(ok);
        cascade.push_child(SyncResult::new("client_item__cost", "item__cost", SyncMode::Incremental));

        assert_eq!(cascade.success_count, 1);
        assert_eq!(cascade.failure_count, 1);
        assert!(!cascade.is_success());
    }

    #[test]
    fn failed_root_aborts_the_cascade() {
        let error = Error::precondition("item", "source table has no primary key");
        let cascade = CascadeSyncResult::new(SyncResult::failed("client_item", "item", SyncMode::FullSync, &error));

        assert!(cascade.aborted);
        assert!(cascade.children.is_empty());
        assert!(!cascade.is_success());
        assert_eq!(cascade.root.errors, vec![error.to_string()]);
    }
}

//! Database schema scanner
//!
//! This module builds the in-memory model of every table and column in the
//! configured schema.

use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::FromRow;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ScanConfig;
use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::schema::compare;
use crate::schema::hierarchy::HierarchyClassifier;
use crate::schema::types::{ColumnInfo, FieldCompareResult, TableInfo};

/// A table as listed by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub name: String,
    pub comment: Option<String>,
    pub row_count: u64,
}

/// Source of table and column metadata
#[async_trait]
pub trait Catalog: Send + Sync {
    /// All base tables of the schema
    async fn list_tables(&self) -> Result<Vec<TableEntry>>;

    /// One table's entry, if it exists
    async fn describe_table(&self, table: &str) -> Result<Option<TableEntry>>;

    /// Columns of one table ordered by ordinal position
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;
}

/// Schema scanner for catalog introspection
#[derive(Clone)]
pub struct SchemaScanner {
    catalog: Arc<dyn Catalog>,
    classifier: HierarchyClassifier,
    client_tables: HashSet<String>,
}

impl SchemaScanner {
    /// Create a scanner over any catalog
    pub fn new(
        catalog: Arc<dyn Catalog>,
        classifier: HierarchyClassifier,
        client_tables: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            catalog,
            classifier,
            client_tables: client_tables.into_iter().collect(),
        }
    }

    /// Create a scanner reading `information_schema` through the connection
    pub fn from_connection(connection: &DatabaseConnection, config: &ScanConfig) -> Self {
        let catalog = MySqlCatalog::new(connection.pool().clone(), connection.schema());
        Self::new(
            Arc::new(catalog),
            HierarchyClassifier::new(config.client_prefix.clone()),
            config.client_tables.iter().cloned(),
        )
    }

    pub fn classifier(&self) -> &HierarchyClassifier {
        &self.classifier
    }

    /// Client-side by prefix or by explicit listing
    pub fn is_client_side(&self, table_name: &str) -> bool {
        self.classifier.has_client_prefix(table_name) || self.client_tables.contains(table_name)
    }

    /// Scan every table.
    ///
    /// Best effort: a table whose columns cannot be read is logged and
    /// returned with no columns. A zero-column table may be incomplete.
    pub async fn scan(&self) -> Result<Vec<TableInfo>> {
        let entries = self.catalog.list_tables().await?;
        let mut tables = Vec::with_capacity(entries.len());

        for entry in entries {
            let columns = match self.catalog.list_columns(&entry.name).await {
                Ok(columns) => columns,
                Err(e) => {
                    tracing::warn!(table = %entry.name, error = %e, "Failed to scan columns, keeping table without columns");
                    Vec::new()
                }
            };
            tables.push(self.build_table(entry, columns));
        }

        tracing::info!(
            tables = tables.len(),
            client_tables = tables.iter().filter(|t| t.is_client_side).count(),
            "Schema scan complete"
        );
        Ok(tables)
    }

    /// Re-read a single table, e.g. after its schema was evolved
    pub async fn scan_table(&self, table_name: &str) -> Result<TableInfo> {
        let entry = self
            .catalog
            .describe_table(table_name)
            .await?
            .ok_or_else(|| Error::SchemaScanError(format!("Table not found: {}", table_name)))?;
        let columns = self.catalog.list_columns(table_name).await?;
        Ok(self.build_table(entry, columns))
    }

    /// Refresh the row-count estimate of a scanned table
    pub async fn refresh_row_count(&self, table: &mut TableInfo) -> Result<()> {
        if let Some(entry) = self.catalog.describe_table(&table.name).await? {
            table.row_count = entry.row_count;
        }
        Ok(())
    }

    fn build_table(&self, entry: TableEntry, mut columns: Vec<ColumnInfo>) -> TableInfo {
        columns.sort_by_key(|c| c.ordinal_position);
        let mut table = TableInfo::new(&entry.name, &self.classifier, self.is_client_side(&entry.name));
        table.comment = entry.comment.filter(|c| !c.is_empty());
        table.row_count = entry.row_count;
        for column in columns {
            table.add_column(column);
        }
        table
    }

    /// Client-side tables of a scan result
    pub fn client_tables(tables: &[TableInfo]) -> Vec<TableInfo> {
        tables.iter().filter(|t| t.is_client_side).cloned().collect()
    }

    /// Server-side tables of a scan result
    pub fn server_tables(tables: &[TableInfo]) -> Vec<TableInfo> {
        tables.iter().filter(|t| !t.is_client_side).cloned().collect()
    }

    pub fn compare_fields(left: &TableInfo, right: &TableInfo) -> FieldCompareResult {
        compare::compare_fields(left, right)
    }
}

#[derive(FromRow)]
struct TableRow {
    table_name: String,
    table_comment: Option<String>,
    table_rows: Option<u64>,
}

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    column_type: String,
    is_nullable: String,
    column_default: Option<String>,
    column_comment: Option<String>,
    column_key: String,
    ordinal_position: u64,
}

impl From<TableRow> for TableEntry {
    fn from(row: TableRow) -> Self {
        Self {
            name: row.table_name,
            comment: row.table_comment,
            row_count: row.table_rows.unwrap_or(0),
        }
    }
}

impl From<ColumnRow> for ColumnInfo {
    fn from(row: ColumnRow) -> Self {
        Self {
            name: row.column_name,
            data_type: row.data_type.to_lowercase(),
            column_type: row.column_type.to_lowercase(),
            nullable: row.is_nullable == "YES",
            default_value: row.column_default,
            comment: row.column_comment.filter(|c| !c.is_empty()),
            is_primary_key: row.column_key == "PRI",
            ordinal_position: u32::try_from(row.ordinal_position).unwrap_or(u32::MAX),
        }
    }
}

// information_schema columns are cast to CHAR: MySQL 8 reports several of
// them with binary collations that do not decode as strings.
const TABLES_SQL: &str = r#"
    SELECT
        CAST(TABLE_NAME AS CHAR) AS table_name,
        CAST(TABLE_COMMENT AS CHAR) AS table_comment,
        TABLE_ROWS AS table_rows
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
"#;

const COLUMNS_SQL: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR) AS column_name,
        CAST(DATA_TYPE AS CHAR) AS data_type,
        CAST(COLUMN_TYPE AS CHAR) AS column_type,
        CAST(IS_NULLABLE AS CHAR) AS is_nullable,
        CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
        CAST(COLUMN_COMMENT AS CHAR) AS column_comment,
        CAST(COLUMN_KEY AS CHAR) AS column_key,
        CAST(ORDINAL_POSITION AS UNSIGNED) AS ordinal_position
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

/// MySQL `information_schema` catalog
pub struct MySqlCatalog {
    pool: MySqlPool,
    schema: String,
}

impl MySqlCatalog {
    pub fn new(pool: MySqlPool, schema: &str) -> Self {
        Self {
            pool,
            schema: schema.to_string(),
        }
    }
}

#[async_trait]
impl Catalog for MySqlCatalog {
    async fn list_tables(&self) -> Result<Vec<TableEntry>> {
        let sql = format!("{} ORDER BY TABLE_NAME", TABLES_SQL);
        let rows = sqlx::query_as::<_, TableRow>(&sql)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(TableEntry::from).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Option<TableEntry>> {
        let sql = format!("{} AND TABLE_NAME = ?", TABLES_SQL);
        let row = sqlx::query_as::<_, TableRow>(&sql)
            .bind(&self.schema)
            .bind(table)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TableEntry::from))
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query_as::<_, ColumnRow>(COLUMNS_SQL)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ColumnInfo::from).collect())
    }
}

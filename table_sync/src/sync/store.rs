//! MySQL row reading and writing for the sync engine
//!
//! Reads decode each column by its catalog type; types without a lossless
//! native mapping (decimal, temporal, json, enum/set) are selected as text and
//! written back as text, which MySQL converts on insert. Writes are batched
//! and check the cancellation token between batches.

use futures::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, Row as _, ValueRef};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::schema::types::{ColumnInfo, TableInfo};
use crate::sync::plan::RowUpdate;
use crate::sync::value::{Row, SqlValue};
use crate::utils::naming::quote_ident;

/// MySQL caps a prepared statement at 65535 placeholders
const MYSQL_MAX_PLACEHOLDERS: usize = 65535;

/// Deadlock and lock-wait timeout abort the whole transaction
const FATAL_ROW_ERRORS: &[u16] = &[1205, 1213];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Signed,
    Unsigned,
    Float32,
    Float64,
    Text,
    Bytes,
    /// Selected through `CAST(... AS CHAR)`
    CastText,
    /// Selected through `CAST(... AS UNSIGNED)`
    CastUnsigned,
}

fn value_kind(column: &ColumnInfo) -> ValueKind {
    match column.data_type.as_str() {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
            if column.is_unsigned() {
                ValueKind::Unsigned
            } else {
                ValueKind::Signed
            }
        }
        "float" => ValueKind::Float32,
        "double" | "real" => ValueKind::Float64,
        "char" | "varchar" | "text" | "tinytext" | "mediumtext" | "longtext" => ValueKind::Text,
        "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => ValueKind::Bytes,
        "bit" => ValueKind::CastUnsigned,
        _ => ValueKind::CastText,
    }
}

fn select_expr(column: &ColumnInfo) -> String {
    let ident = quote_ident(&column.name);
    match value_kind(column) {
        ValueKind::CastText => format!("CAST({} AS CHAR) AS {}", ident, ident),
        ValueKind::CastUnsigned => format!("CAST({} AS UNSIGNED) AS {}", ident, ident),
        _ => ident,
    }
}

fn decode(row: &MySqlRow, index: usize, kind: ValueKind) -> std::result::Result<SqlValue, sqlx::Error> {
    let is_null = row.try_get_raw(index).map(|r| r.is_null()).unwrap_or(true);
    if is_null {
        return Ok(SqlValue::Null);
    }

    let value = match kind {
        ValueKind::Signed => SqlValue::Int(row.try_get::<i64, _>(index)?),
        ValueKind::Unsigned | ValueKind::CastUnsigned => SqlValue::UInt(row.try_get::<u64, _>(index)?),
        ValueKind::Float32 => SqlValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        ValueKind::Float64 => SqlValue::Float(row.try_get::<f64, _>(index)?),
        ValueKind::Text | ValueKind::CastText => SqlValue::Text(row.try_get::<String, _>(index)?),
        ValueKind::Bytes => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

fn bind_value<'q>(query: Query<'q, MySql, MySqlArguments>, value: &SqlValue) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::UInt(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
    }
}

/// Read `columns` of every row of `table`, ordered by `order_by`.
///
/// Columns missing from the scanned table are a precondition error.
pub async fn fetch_rows(
    conn: &mut MySqlConnection,
    table: &TableInfo,
    columns: &[String],
    order_by: &[String],
) -> Result<Vec<Row>> {
    let infos = columns
        .iter()
        .map(|name| {
            table
                .column(name)
                .ok_or_else(|| Error::precondition(&table.name, format!("missing column {}", name)))
        })
        .collect::<Result<Vec<&ColumnInfo>>>()?;
    let kinds: Vec<ValueKind> = infos.iter().map(|c| value_kind(c)).collect();

    let mut sql = format!(
        "SELECT {} FROM {}",
        infos.iter().map(|c| select_expr(c)).collect::<Vec<_>>().join(", "),
        quote_ident(&table.name)
    );
    if !order_by.is_empty() {
        let order: Vec<String> = order_by.iter().map(|c| quote_ident(c)).collect();
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }

    let mut rows = Vec::new();
    let mut stream = sqlx::query(&sql).fetch(&mut *conn);
    while let Some(raw) = stream.try_next().await? {
        let mut row = Row::with_capacity(columns.len());
        for (index, (name, kind)) in columns.iter().zip(&kinds).enumerate() {
            let value = decode(&raw, index, *kind).map_err(|e| {
                Error::DatabaseError(format!("{}.{}: {}", table.name, name, e))
            })?;
            row.insert(name.clone(), value);
        }
        rows.push(row);
    }

    tracing::debug!(table = %table.name, rows = rows.len(), "Fetched rows");
    Ok(rows)
}

/// Fail unless the table can be read
pub async fn ensure_readable(conn: &mut MySqlConnection, table: &str) -> Result<()> {
    let sql = format!("SELECT 1 FROM {} LIMIT 1", quote_ident(table));
    sqlx::query(&sql)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| Error::precondition(table, format!("table is not reachable: {}", e)))?;
    Ok(())
}

/// Longest stored value of a character or binary column
pub async fn max_stored_length(conn: &mut MySqlConnection, table: &str, column: &ColumnInfo) -> Result<u64> {
    let length_fn = match column.data_type.as_str() {
        "binary" | "varbinary" => "LENGTH",
        _ => "CHAR_LENGTH",
    };
    let sql = format!(
        "SELECT CAST(COALESCE(MAX({}({})), 0) AS UNSIGNED) FROM {}",
        length_fn,
        quote_ident(&column.name),
        quote_ident(table)
    );
    let length: u64 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
    Ok(length)
}

/// What to do when the database rejects a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowErrorPolicy {
    /// Skip and count the row
    Skip,
    /// Fail the call
    Abort,
}

/// Rows written and rows rejected by one write phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub written: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

impl WriteOutcome {
    fn reject(&mut self, policy: RowErrorPolicy, table: &str, what: String, error: sqlx::Error) -> Result<()> {
        if policy == RowErrorPolicy::Abort || !is_row_error(&error) {
            return Err(Error::sync(table, format!("{}: {}", what, error)));
        }
        tracing::warn!(table, row = %what, error = %error, "Row rejected, skipping");
        self.failed += 1;
        self.errors.push(format!("{}: {}", what, error));
        Ok(())
    }
}

/// A database-reported error confined to one statement
fn is_row_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map_or(true, |e| !FATAL_ROW_ERRORS.contains(&e.number())),
        _ => false,
    }
}

/// Batched writer bound to one table and one connection
pub struct RowWriter<'a> {
    table: &'a str,
    batch_size: usize,
    policy: RowErrorPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> RowWriter<'a> {
    pub fn new(table: &'a str, batch_size: usize, policy: RowErrorPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            table,
            batch_size: batch_size.max(1),
            policy,
            cancel,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!(table = self.table, "Sync cancelled between batches");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Multi-row `INSERT`s; a rejected batch is retried row by row
    pub async fn insert_rows(&self, conn: &mut MySqlConnection, rows: &[Row]) -> Result<WriteOutcome> {
        let mut outcome = WriteOutcome::default();
        let Some(first) = rows.first() else {
            return Ok(outcome);
        };

        let columns: Vec<String> = first.keys().cloned().collect();
        let per_batch = self.batch_size.min(MYSQL_MAX_PLACEHOLDERS / columns.len().max(1)).max(1);
        let column_list = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));

        for chunk in rows.chunks(per_batch) {
            self.check_cancelled()?;

            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                quote_ident(self.table),
                column_list,
                vec![row_placeholders.as_str(); chunk.len()].join(", ")
            );
            let mut query = sqlx::query(&sql);
            for row in chunk {
                for column in &columns {
                    query = bind_value(query, row.get(column).unwrap_or(&SqlValue::Null));
                }
            }

            match query.execute(&mut *conn).await {
                Ok(result) => outcome.written += result.rows_affected(),
                Err(e) if chunk.len() > 1 && self.policy == RowErrorPolicy::Skip && is_row_error(&e) => {
                    tracing::debug!(table = self.table, error = %e, "Batch insert rejected, retrying row by row");
                    let single = format!("INSERT INTO {} ({}) VALUES {}", quote_ident(self.table), column_list, row_placeholders);
                    for row in chunk {
                        let mut query = sqlx::query(&single);
                        for column in &columns {
                            query = bind_value(query, row.get(column).unwrap_or(&SqlValue::Null));
                        }
                        match query.execute(&mut *conn).await {
                            Ok(result) => outcome.written += result.rows_affected(),
                            Err(e) => outcome.reject(self.policy, self.table, describe_row(row), e)?,
                        }
                    }
                }
                Err(e) => outcome.reject(self.policy, self.table, format!("insert of {} rows", chunk.len()), e)?,
            }

            tracing::debug!(table = self.table, written = outcome.written, "Insert batch done");
        }

        Ok(outcome)
    }

    /// One `UPDATE` per row, addressed with null-safe equality
    pub async fn update_rows(&self, conn: &mut MySqlConnection, updates: &[RowUpdate]) -> Result<WriteOutcome> {
        let mut outcome = WriteOutcome::default();

        for chunk in updates.chunks(self.batch_size) {
            self.check_cancelled()?;

            for update in chunk {
                let assignments: Vec<String> = update
                    .values
                    .keys()
                    .map(|c| format!("{} = ?", quote_ident(c)))
                    .collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE {}",
                    quote_ident(self.table),
                    assignments.join(", "),
                    where_clause(&update.locator)
                );

                let mut query = sqlx::query(&sql);
                for value in update.values.values().chain(update.locator.values()) {
                    query = bind_value(query, value);
                }

                match query.execute(&mut *conn).await {
                    Ok(_) => outcome.written += 1,
                    Err(e) => outcome.reject(self.policy, self.table, describe_row(&update.locator), e)?,
                }
            }
        }

        Ok(outcome)
    }

    /// One `DELETE` per locator
    pub async fn delete_rows(&self, conn: &mut MySqlConnection, locators: &[Row]) -> Result<WriteOutcome> {
        let mut outcome = WriteOutcome::default();

        for chunk in locators.chunks(self.batch_size) {
            self.check_cancelled()?;

            for locator in chunk {
                let sql = format!(
                    "DELETE FROM {} WHERE {} LIMIT 1",
                    quote_ident(self.table),
                    where_clause(locator)
                );
                let mut query = sqlx::query(&sql);
                for value in locator.values() {
                    query = bind_value(query, value);
                }

                match query.execute(&mut *conn).await {
                    Ok(result) => outcome.written += result.rows_affected(),
                    Err(e) => outcome.reject(self.policy, self.table, describe_row(locator), e)?,
                }
            }
        }

        Ok(outcome)
    }
}

fn where_clause(locator: &Row) -> String {
    locator
        .keys()
        .map(|c| format!("{} <=> ?", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn describe_row(row: &Row) -> String {
    let parts: Vec<String> = row
        .iter()
        .take(4)
        .map(|(c, v)| format!("{}={}", c, v.key_repr()))
        .collect();
    format!("row ({})", parts.join(", "))
}

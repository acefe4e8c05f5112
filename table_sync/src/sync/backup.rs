//! Table-level backups taken before destructive writes

use chrono::Utc;
use sqlx::mysql::MySqlConnection;

use crate::error::{Error, Result};
use crate::utils::naming::{backup_table_name, quote_ident};

/// Copy `table` into a fresh timestamped table; returns the backup's name.
///
/// Runs outside any transaction: `CREATE TABLE` commits implicitly.
pub async fn backup_table(conn: &mut MySqlConnection, table: &str) -> Result<String> {
    let backup = backup_table_name(table, Utc::now());

    sqlx::query(&format!(
        "CREATE TABLE {} LIKE {}",
        quote_ident(&backup),
        quote_ident(table)
    ))
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::sync(table, format!("backup table creation failed: {}", e)))?;

    let copied = sqlx::query(&format!(
        "INSERT INTO {} SELECT * FROM {}",
        quote_ident(&backup),
        quote_ident(table)
    ))
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::sync(table, format!("backup copy failed: {}", e)))?
    .rows_affected();

    tracing::info!(table, backup = %backup, rows = copied, "Backup created");
    Ok(backup)
}

/// Replace the contents of `table` with those of `backup`.
///
/// The connection should be inside a transaction so a failed copy leaves the
/// table untouched.
pub async fn restore_rows(conn: &mut MySqlConnection, table: &str, backup: &str) -> Result<u64> {
    sqlx::query(&format!("DELETE FROM {}", quote_ident(table)))
        .execute(&mut *conn)
        .await?;

    let restored = sqlx::query(&format!(
        "INSERT INTO {} SELECT * FROM {}",
        quote_ident(table),
        quote_ident(backup)
    ))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    tracing::info!(table, backup, rows = restored, "Table restored from backup");
    Ok(restored)
}

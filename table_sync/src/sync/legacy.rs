//! Full-replace sync between a client table and a server table
//!
//! Not hierarchy-aware: the target is emptied and refilled with every source
//! row over the common columns, in one transaction. Any rejected row fails the
//! whole call.

use sqlx::mysql::MySqlConnection;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::db::connection::DatabaseConnection;
use crate::db::transaction::SyncTransaction;
use crate::error::{Error, Result};
use crate::schema::scanner::SchemaScanner;
use crate::schema::types::TableInfo;
use crate::sync::backup;
use crate::sync::store::{self, RowErrorPolicy, RowWriter};
use crate::sync::types::{SyncMode, SyncResult};
use crate::sync::value::Row;
use crate::utils::naming::quote_ident;

/// Delete-then-copy data sync
#[derive(Clone)]
pub struct DataSyncService {
    connection: DatabaseConnection,
    batch_size: usize,
    backup_before_write: bool,
    cancel: CancellationToken,
}

impl DataSyncService {
    pub fn new(connection: DatabaseConnection, batch_size: usize) -> Self {
        Self {
            connection,
            batch_size,
            backup_before_write: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Copy the target into a backup table before replacing it
    pub fn with_backup(mut self, backup_before_write: bool) -> Self {
        self.backup_before_write = backup_before_write;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn sync_client_to_server(&self, client: &TableInfo, server: &TableInfo) -> SyncResult {
        self.replace(client, server).await
    }

    pub async fn sync_server_to_client(&self, server: &TableInfo, client: &TableInfo) -> SyncResult {
        self.replace(server, client).await
    }

    /// Put a backup's rows back into `table`, atomically
    pub async fn restore_from_backup(&self, table: &str, backup_table: &str) -> Result<u64> {
        let mut conn = self.connection.pool().acquire().await?;
        store::ensure_readable(&mut conn, backup_table).await?;

        let mut tx = SyncTransaction::begin(&mut conn, table).await?;
        let outcome = backup::restore_rows(tx.conn(), table, backup_table).await;
        tx.finish(outcome).await
    }

    async fn replace(&self, source: &TableInfo, target: &TableInfo) -> SyncResult {
        let started = Instant::now();
        let mut result = match self.run(source, target).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(source = %source.name, target = %target.name, error = %e, "Full replace failed");
                SyncResult::failed(&source.name, &target.name, SyncMode::FullSync, &e)
            }
        };
        result.elapsed_ms = started.elapsed().as_millis() as u64;
        result
    }

    async fn run(&self, source: &TableInfo, target: &TableInfo) -> Result<SyncResult> {
        let mut result = SyncResult::new(&source.name, &target.name, SyncMode::FullSync);

        let columns = SchemaScanner::compare_fields(source, target).common_names();
        if columns.is_empty() {
            return Err(Error::precondition(&target.name, "no common fields to copy"));
        }

        let mut conn = self.connection.pool().acquire().await?;
        store::ensure_readable(&mut conn, &source.name).await?;

        if self.backup_before_write {
            result.backup_table = Some(backup::backup_table(&mut conn, &target.name).await?);
        }

        let rows = store::fetch_rows(&mut conn, source, &columns, &source.primary_key()).await?;

        let mut tx = SyncTransaction::begin(&mut conn, &target.name).await?;
        let outcome = self.delete_and_copy(tx.conn(), &target.name, &rows).await;
        let (deleted, inserted) = tx.finish(outcome).await?;

        result.deleted_rows = deleted;
        result.inserted_rows = inserted;
        result.success = true;
        tracing::info!(
            source = %source.name,
            target = %target.name,
            deleted,
            inserted,
            "Full replace complete"
        );
        Ok(result)
    }

    async fn delete_and_copy(&self, conn: &mut MySqlConnection, table: &str, rows: &[Row]) -> Result<(u64, u64)> {
        let deleted = sqlx::query(&format!("DELETE FROM {}", quote_ident(table)))
            .execute(&mut *conn)
            .await?
            .rows_affected();

        let writer = RowWriter::new(table, self.batch_size, RowErrorPolicy::Abort, &self.cancel);
        let inserted = writer.insert_rows(conn, rows).await?;
        Ok((deleted, inserted.written))
    }
}

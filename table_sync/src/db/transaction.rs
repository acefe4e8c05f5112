//! Savepoint-guarded transaction scope
//!
//! Every row-mutating sync call runs inside one of these. The scope borrows
//! the connection the sync call acquired for its whole duration; the outcome
//! of the work decides between commit and rollback. Dropping an unfinished
//! scope rolls back.

use sqlx::mysql::MySqlConnection;
use sqlx::{Connection, MySql, Transaction};

use crate::error::Result;

/// Open transaction with a named savepoint
pub struct SyncTransaction<'c> {
    tx: Transaction<'c, MySql>,
    savepoint: String,
}

impl<'c> SyncTransaction<'c> {
    /// Start a transaction on the connection and set the savepoint
    pub async fn begin(conn: &'c mut MySqlConnection, label: &str) -> Result<Self> {
        let mut tx = conn.begin().await?;
        let savepoint = savepoint_name(label);

        sqlx::query(&format!("SAVEPOINT {}", savepoint))
            .execute(&mut *tx)
            .await?;

        tracing::debug!(savepoint = %savepoint, "Transaction started");
        Ok(Self { tx, savepoint })
    }

    /// Connection bound to the transaction
    pub fn conn(&mut self) -> &mut MySqlConnection {
        &mut *self.tx
    }

    /// Commit on `Ok`, roll back to the savepoint on `Err`
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    /// Release the savepoint and commit
    pub async fn commit(mut self) -> Result<()> {
        sqlx::query(&format!("RELEASE SAVEPOINT {}", self.savepoint))
            .execute(&mut *self.tx)
            .await?;
        self.tx.commit().await?;
        tracing::debug!(savepoint = %self.savepoint, "Transaction committed");
        Ok(())
    }

    /// Roll back to the savepoint, then abandon the transaction.
    ///
    /// Rollback failures are logged; the original error is what callers report.
    pub async fn rollback(mut self) {
        let sql = format!("ROLLBACK TO SAVEPOINT {}", self.savepoint);
        if let Err(e) = sqlx::query(&sql).execute(&mut *self.tx).await {
            tracing::warn!(savepoint = %self.savepoint, error = %e, "Rollback to savepoint failed");
        }
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(savepoint = %self.savepoint, error = %e, "Transaction rollback failed");
        } else {
            tracing::info!(savepoint = %self.savepoint, "Transaction rolled back");
        }
    }
}

/// Savepoint identifiers must be plain SQL identifiers
pub fn savepoint_name(label: &str) -> String {
    let label = crate::utils::naming::sanitize_identifier(label);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("sp_{}_{}", label, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savepoint_names_are_identifiers() {
        let name = savepoint_name("item-misc sync");
        assert!(name.starts_with("sp_item_misc_sync_"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert_ne!(savepoint_name("a"), savepoint_name("a"));
    }
}

//! Database module for table_sync
//!
//! This module handles the connection pool and transaction scoping.

pub mod connection;
pub mod transaction;

// Re-export key types
pub use connection::DatabaseConnection;
pub use transaction::SyncTransaction;

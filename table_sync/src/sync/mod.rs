//! Sync module for table_sync
//!
//! This module moves rows between matched tables: planning, schema
//! evolution, batched writes and the cascade over child tables.

pub mod backup;
pub mod engine;
pub mod evolve;
pub mod legacy;
pub mod plan;
pub mod store;
pub mod types;
pub mod value;

// Re-export key types
pub use engine::SyncEngine;
pub use legacy::DataSyncService;
pub use plan::{plan_row_sync, KeyStrategy, PrimaryKeyMapping, RowSyncPlan};
pub use types::{CascadeSyncResult, SyncMode, SyncOptions, SyncResult};
pub use value::{Row, RowKey, SqlValue};

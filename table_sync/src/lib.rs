//! table_sync: matches client and server game-data tables and synchronizes their rows
//!
//! The client and server schemas describe the same domain under different
//! table and column names. table_sync discovers which client table
//! corresponds to which server table, then copies rows across matched pairs
//! under one of several consistency modes, cascading into child tables.

pub mod config;
pub mod db;
pub mod error;
pub mod matching;
pub mod schema;
pub mod sync;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use error::{Error, Result};
pub use matching::{MatchMethod, NameMatcher, OverrideMap, TablePairResult};
pub use schema::{SchemaScanner, TableInfo};
pub use sync::{CascadeSyncResult, DataSyncService, SyncEngine, SyncMode, SyncOptions, SyncResult};

use schema::hierarchy::HierarchyClassifier;

/// Initialize table_sync with the specified configuration file
pub async fn init(config_path: &str) -> Result<TableSyncClient> {
    let config = config::load_from_file(config_path)?;
    TableSyncClient::new(config).await
}

/// The main client for interacting with table_sync
pub struct TableSyncClient {
    config: Config,
    db_connection: DatabaseConnection,
    scanner: SchemaScanner,
    matcher: NameMatcher,
}

impl TableSyncClient {
    /// Create a new client from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let db_connection = DatabaseConnection::connect(&config.database).await?;
        let scanner = SchemaScanner::from_connection(&db_connection, &config.scan);
        let overrides = match &config.matching.overrides_file {
            Some(path) => OverrideMap::load(path)?,
            None => OverrideMap::new(),
        };
        let matcher = NameMatcher::from_config(
            &config.matching,
            HierarchyClassifier::new(config.scan.client_prefix.clone()),
            overrides,
        );

        Ok(Self {
            config,
            db_connection,
            scanner,
            matcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db_connection
    }

    pub fn scanner(&self) -> &SchemaScanner {
        &self.scanner
    }

    pub fn matcher(&self) -> &NameMatcher {
        &self.matcher
    }

    /// Scan every table in the configured schema
    pub async fn scan_tables(&self) -> Result<Vec<TableInfo>> {
        self.scanner.scan().await
    }

    /// Scan, then pair every client table with a server table
    pub async fn build_pairs(&self) -> Result<Vec<TablePairResult>> {
        let tables = self.scan_tables().await?;
        Ok(self.matcher.batch_match(&tables))
    }

    /// Sync engine with the configured defaults
    pub fn sync_engine(&self) -> SyncEngine {
        self.sync_engine_with(self.config.sync.to_options())
    }

    /// Sync engine with per-call options
    pub fn sync_engine_with(&self, options: SyncOptions) -> SyncEngine {
        SyncEngine::new(self.db_connection.clone(), self.scanner.clone(), options)
    }

    /// Full-replace sync service with the configured batch size and backup flag
    pub fn data_sync_service(&self) -> DataSyncService {
        DataSyncService::new(self.db_connection.clone(), self.config.sync.batch_size)
            .with_backup(self.config.sync.backup_before_write)
    }
}

/// Find a table by name in a scan result
pub fn find_table<'a>(tables: &'a [TableInfo], name: &str) -> Result<&'a TableInfo> {
    tables
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| Error::SchemaScanError(format!("Table not found: {}", name)))
}

//! Database connection handling
//!
//! This module provides functionality to establish and manage the MySQL pool
//! shared by the scanner and the sync engine.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Pooled connection to the schema holding both table families
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: MySqlPool,
    schema: String,
}

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool_size = config.pool_size.unwrap_or(10);
        let timeout_seconds = config.timeout_seconds.unwrap_or(30);

        match config.driver.as_str() {
            "mysql" => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(pool_size)
                    .acquire_timeout(std::time::Duration::from_secs(timeout_seconds))
                    .connect(&config.url)
                    .await?;

                tracing::info!(schema = %config.schema, pool_size, "Connected to database");

                Ok(Self {
                    pool,
                    schema: config.schema.clone(),
                })
            }
            _ => Err(Error::DatabaseError(format!(
                "Unsupported database driver: {}",
                config.driver
            ))),
        }
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: MySqlPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Get the schema name from the connection
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Underlying pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

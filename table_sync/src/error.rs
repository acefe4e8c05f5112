//! Error types for table_sync

use thiserror::Error;

/// Result type for table_sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for table_sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Schema scan error: {0}")]
    SchemaScanError(String),

    /// A sync pre-check failed; nothing was written.
    #[error("Precondition failed for {table}: {message}")]
    PreconditionError { table: String, message: String },

    #[error("Schema evolution error: {0}")]
    SchemaEvolutionError(String),

    /// Fatal failure inside the sync transaction; the transaction was rolled back.
    #[error("Sync failed for {table}: {message}")]
    SyncError { table: String, message: String },

    #[error("Override map error: {0}")]
    OverrideError(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Create a precondition error for a table
    pub fn precondition(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PreconditionError {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a sync error for a table
    pub fn sync(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::SyncError {
            table: table.into(),
            message: message.into(),
        }
    }

    /// True if the error was raised before anything was written
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::PreconditionError { .. })
    }
}

/// Convert Serde JSON errors to table_sync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert Serde YAML errors to table_sync errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to table_sync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

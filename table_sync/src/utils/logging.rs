//! Logging utilities for table_sync
//!
//! Console logs go to stderr; stdout is reserved for command results.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Parse a configured level name, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn default_config() -> LoggingConfig {
    LoggingConfig {
        level: "info".to_string(),
        file: None,
        format: "text".to_string(),
        stdout: true,
    }
}

/// Initialize logging based on configuration.
///
/// A configured file wins over the console. `RUST_LOG` directives are
/// honoured on top of the configured level.
pub fn init_logging(config: &Option<LoggingConfig>) -> Result<()> {
    let fallback = default_config();
    let config = config.as_ref().unwrap_or(&fallback);

    let directive = format!("table_sync={}", parse_level(&config.level))
        .parse()
        .map_err(|e| Error::ConfigError(format!("Invalid log directive: {}", e)))?;
    let env_filter = EnvFilter::from_default_env().add_directive(directive);

    let (writer, ansi) = match &config.file {
        Some(file_path) => {
            if let Some(parent) = Path::new(file_path).parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            (BoxMakeWriter::new(Arc::new(File::create(file_path)?)), false)
        }
        None if config.stdout => (BoxMakeWriter::new(std::io::stderr), true),
        None => return Ok(()),
    };

    let layer = if config.format.eq_ignore_ascii_case("json") {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().with_ansi(ansi).with_writer(writer).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .try_init()
        .map_err(|e| Error::Unknown(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn console_logging_is_the_default() {
        let config = default_config();
        assert!(config.stdout);
        assert!(config.file.is_none());
    }
}

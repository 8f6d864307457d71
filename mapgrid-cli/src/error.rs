//! CLI error type.

use std::fmt;

use mapgrid::config::ConfigError;
use mapgrid::logging::LoggingError;
use mapgrid::MapError;

/// Errors surfaced by CLI commands. Every variant exits with status 1.
#[derive(Debug)]
pub enum CliError {
    /// Bad command-line arguments.
    Args(String),

    /// Configuration file problem.
    Config(ConfigError),

    /// Rendering or datasource failure.
    Map(MapError),

    /// Failed to load a layer file.
    Layer { name: String, message: String },

    /// Logging setup failed.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime.
    Runtime(String),

    /// Output failure.
    Io(std::io::Error),

    /// JSON serialization failure.
    Json(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Args(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Map(e) => write!(f, "{}", e),
            CliError::Layer { name, message } => {
                write!(f, "Failed to load layer '{}': {}", name, message)
            }
            CliError::Logging(e) => write!(f, "Failed to set up logging: {}", e),
            CliError::Runtime(msg) => write!(f, "Failed to create Tokio runtime: {}", msg),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
            CliError::Json(e) => write!(f, "Failed to serialize output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Map(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Args(_) | CliError::Layer { .. } | CliError::Runtime(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<MapError> for CliError {
    fn from(e: MapError) -> Self {
        CliError::Map(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

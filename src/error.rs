// src/error.rs - Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandJointsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Tracking session lifecycle failures. None of these are retried.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Hand tracking is not supported by provider '{0}'")]
    Unsupported(String),

    #[error("Failed to start provider '{provider}': {reason}")]
    Start { provider: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to open recording {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },
}

//! Error types for Stackforge

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Stackforge operations
pub type Result<T> = std::result::Result<T, StackforgeError>;

/// Stackforge error types
#[derive(Error, Debug)]
pub enum StackforgeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Compose error: {0}")]
    Compose(String),

    #[error("Compose file parse error: {0}")]
    ComposeParse(String),

    #[error("Output file already exists: {} (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for docgraph operations
#[derive(Error, Debug)]
pub enum DocgraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("No graph snapshot found at {}", .0.display())]
    SnapshotMissing(PathBuf),

    #[error("Graph snapshot at {} is unreadable: {message}", path.display())]
    SnapshotCorrupt { path: PathBuf, message: String },
}

impl DocgraphError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DocgraphError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocgraphError>;

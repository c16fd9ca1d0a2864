//! Error types for recalld

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecallError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage init failed: {0}")]
    StorageInit(String),

    #[error("Store is closed")]
    ClosedStore,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    #[error("Unsupported query mode: {0}")]
    UnsupportedMode(String),

    #[error("Failed to read config: {0}")]
    ConfigRead(String),

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Config file not found at {}", .0.display())]
    ConfigMissing(PathBuf),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RecallError>;

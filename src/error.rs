//! Error types for persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the persistence layer.
///
/// Reads and writes of store state never fail; these only surface from
/// backends and from the explicit `hydrate`/`flush` calls on a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage file {path} is not a JSON object of strings: {source}")]
    InvalidStorageFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to determine platform data directory")]
    NoDataDir,
}

/// Result alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

//! Storage error types.

use std::path::PathBuf;

/// Errors raised by persistent session storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the storage file failed.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        /// Storage file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The storage file does not hold a JSON object of strings.
    #[error("corrupt storage file {path}: {source}")]
    Corrupt {
        /// Storage file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// No platform configuration directory could be determined.
    #[error("no configuration directory available for storage")]
    NoStorageDir,
}

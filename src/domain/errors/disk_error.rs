//! Disk tier errors. These stay internal: they are logged, never returned
//! from a lookup.

use thiserror::Error;

/// Disk cache failure variants.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DiskError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write cache entry {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read cache directory: {0}")]
    ReadDir(#[source] std::io::Error),

    #[error("disk task failed: {message}")]
    Task { message: String },
}

impl DiskError {
    /// Creates write error.
    #[must_use]
    pub fn write(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            key: key.into(),
            source,
        }
    }

    /// Creates task error.
    #[must_use]
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a student already exists with roll {0}")]
    DuplicateKey(i32),

    #[error("no student with roll {0}")]
    NotFound(i32),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read records file {}: {source}", .path.display())]
    StorageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "failed to write records file {}: wrote {written} of {expected} records",
        .path.display()
    )]
    StorageWrite {
        path: PathBuf,
        written: usize,
        expected: usize,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl StoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        StoreError::InvalidInput(message.into())
    }

    /// Stable error code reported over IPC.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateKey(_) => "duplicate_key",
            StoreError::NotFound(_) => "not_found",
            StoreError::InvalidInput(_) => "invalid_input",
            StoreError::StorageRead { .. } => "storage_read_failed",
            StoreError::StorageWrite { .. } => "storage_write_failed",
        }
    }
}

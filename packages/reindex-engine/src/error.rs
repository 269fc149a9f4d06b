use reindex_storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Record store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IndexError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn vector_index<E: std::fmt::Display>(e: E) -> Self {
        Self::VectorIndex(e.to_string())
    }

    /// True when the underlying failure is the record store's
    /// monotonic-clock guard tripping.
    pub fn is_clock_skew(&self) -> bool {
        matches!(
            self,
            IndexError::Storage(err) if err.kind == reindex_storage::ErrorKind::ClockSkew
        )
    }
}

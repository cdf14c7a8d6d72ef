//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata index could not be loaded or saved.
    #[error("Index error: {0}")]
    Index(#[from] crate::index::IndexError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

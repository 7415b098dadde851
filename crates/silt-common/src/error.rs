//! Error types for SiltDB.

use thiserror::Error;

/// Result type alias using SiltError.
pub type Result<T> = std::result::Result<T, SiltError>;

/// Errors that can occur in SiltDB operations.
///
/// Expected outcomes are not errors: a duplicate key on index insert and a
/// miss on lookup/remove are reported as boolean or empty results by the
/// callers, leaving this enum for conditions the caller must react to.
#[derive(Debug, Error)]
pub enum SiltError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: u32 },

    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    #[error("B+ tree corrupted: {0}")]
    TreeCorrupted(String),

    #[error("WAL write failed: {0}")]
    WalWriteFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

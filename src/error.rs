//! Error types for IndexKV
//!
//! Two layers of errors:
//! - [`StoreError`]: anything a backing store reports for get/set/remove
//! - [`IndexError`]: everything the indexed wrapper can fail with, including
//!   store failures carried through unchanged

use thiserror::Error;

/// Result type alias using IndexError
pub type Result<T> = std::result::Result<T, IndexError>;

/// Result type alias for store-level operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a [`Store`](crate::store::Store) backend
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Unified error type for indexed store operations
#[derive(Debug, Error)]
pub enum IndexError {
    // -------------------------------------------------------------------------
    // Validation Errors (raised before any I/O)
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(String),

    // -------------------------------------------------------------------------
    // Store Errors (propagated unchanged)
    // -------------------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    #[error("Registry serialization error: {0}")]
    Serialization(String),

    #[error("Registry writer closed")]
    WriterClosed,

    // -------------------------------------------------------------------------
    // Runtime Errors
    // -------------------------------------------------------------------------
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl IndexError {
    /// The underlying store error, if this failure came from the store
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            IndexError::Store(e) => Some(e),
            _ => None,
        }
    }
}

//! Storage Adapter Error Types

use crate::store::TxId;
use std::io;
use thiserror::Error;

/// Storage adapter errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transaction id is not known to the store
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxId),

    /// The transaction was already committed or rolled back
    #[error("transaction {0} is closed")]
    TransactionClosed(TxId),

    /// A transaction is already open; the store serializes writes
    #[error("transaction {0} is still open")]
    TransactionOpen(TxId),

    /// The store's contents are inconsistent
    #[error("corrupt store: {0}")]
    Corrupt(String),

    /// Adapter-specific failure
    #[error("{0}")]
    Other(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

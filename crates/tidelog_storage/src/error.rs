//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a byte store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A positional read extended past the end of the store.
    #[error("read past end of store: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested read offset.
        offset: u64,
        /// Requested read length.
        len: usize,
        /// Store size at the time of the read.
        size: u64,
    },

    /// A truncate call asked for a size larger than the store.
    #[error("cannot truncate to {requested} bytes, store holds {size}")]
    TruncatePastEnd {
        /// Requested new size.
        requested: u64,
        /// Current store size.
        size: u64,
    },
}

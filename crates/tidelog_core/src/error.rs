//! Error types for the tidelog engine.

use std::io;
use thiserror::Error;
use tidelog_codec::CodecError;
use tidelog_storage::StoreError;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur while operating a log.
#[derive(Debug, Error)]
pub enum LogError {
    /// Byte store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Frame codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The data file header could not be read.
    #[error("failed to read log header: {message}")]
    ReadLogHeader {
        /// Underlying failure.
        message: String,
    },

    /// The data file header could not be written.
    #[error("failed to write log header: {message}")]
    WriteLogHeader {
        /// Underlying failure.
        message: String,
    },

    /// The index file header could not be read.
    #[error("failed to read index header: {message}")]
    ReadIndexHeader {
        /// Underlying failure.
        message: String,
    },

    /// The index file header could not be written.
    #[error("failed to write index header: {message}")]
    WriteIndexHeader {
        /// Underlying failure.
        message: String,
    },

    /// A file carries a signature that is not the expected one.
    #[error("invalid file signature: {found:?}")]
    InvalidFileSignature {
        /// The signature bytes found on disk.
        found: [u8; 3],
    },

    /// A file carries an unrecognized format version.
    #[error("invalid file version: {found}")]
    InvalidFileVersion {
        /// The version byte found on disk.
        found: u8,
    },

    /// A record could not be read from the data file.
    #[error("failed to read record: {message}")]
    ReadLogRecord {
        /// Underlying failure.
        message: String,
    },

    /// A record could not be written, or the data and index files have
    /// diverged mid-write. The log refuses further writes until recovery.
    #[error("failed to write record: {message}")]
    WriteLogRecord {
        /// Underlying failure.
        message: String,
    },

    /// An entry could not be read from the index file.
    #[error("failed to read index record")]
    ReadIndexRecord,

    /// A stored record declares a size beyond the configured maximum.
    #[error("invalid record size: {size} bytes exceeds limit {limit}")]
    InvalidRecordSize {
        /// Size declared in the stored record header.
        size: usize,
        /// The configured maximum record size.
        limit: usize,
    },

    /// A write payload exceeds the configured maximum record size.
    #[error("record too large: {size} bytes exceeds maximum {max}")]
    RecordTooLarge {
        /// Payload size of the rejected write.
        size: usize,
        /// The configured maximum record size.
        max: usize,
    },

    /// A slice request lies outside the index.
    #[error("slice out of bounds: offset {offset}, index holds {count} entries")]
    SliceOutOfBounds {
        /// The requested record offset.
        offset: u64,
        /// Number of entries in the index (or slice) at the time.
        count: u64,
    },

    /// The index entry region could not be read.
    #[error("failed to read index records: {message}")]
    ReadIndex {
        /// Underlying failure.
        message: String,
    },

    /// `open` was called on a log that is not in the unopened state.
    #[error("log already open")]
    LogAlreadyOpen,

    /// A write or flush was attempted after `close`.
    #[error("log has been closed")]
    LogClosed,

    /// Another process holds the write lock on the data file.
    #[error("log locked: another process holds the write lock")]
    LogLocked,

    /// The configured TTL is negative.
    #[error("invalid ttl {ttl}: must be >= 0")]
    InvalidTtl {
        /// The rejected TTL value.
        ttl: i64,
    },

    /// No durability strategy was configured.
    #[error("invalid write strategy: a durability strategy is required")]
    InvalidLogStrategy,

    /// The configured maximum record size does not fit the record header.
    #[error("invalid max record size: {size} exceeds u32::MAX")]
    InvalidMaxRecordSize {
        /// The rejected maximum.
        size: usize,
    },

    /// A single buffered write exceeds the write buffer capacity.
    #[error("write of {len} bytes exceeds buffer capacity {capacity}")]
    BufferTooLarge {
        /// Length of the rejected write.
        len: usize,
        /// Capacity of the write buffer.
        capacity: usize,
    },
}

impl LogError {
    pub(crate) fn read_log_record(err: impl ToString) -> Self {
        Self::ReadLogRecord {
            message: err.to_string(),
        }
    }

    pub(crate) fn write_log_record(err: impl ToString) -> Self {
        Self::WriteLogRecord {
            message: err.to_string(),
        }
    }

    pub(crate) fn read_index(err: impl ToString) -> Self {
        Self::ReadIndex {
            message: err.to_string(),
        }
    }
}

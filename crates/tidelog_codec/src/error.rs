//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer is too small for the requested read or write.
    #[error("buffer too small: need {needed} bytes at offset {offset}, have {len}")]
    BufferTooSmall {
        /// Bytes required past the offset.
        needed: usize,
        /// Offset the operation started at.
        offset: usize,
        /// Total buffer length.
        len: usize,
    },

    /// A record frame's declared size does not match its buffer.
    #[error("invalid record size: header declares {declared} payload bytes, frame carries {actual}")]
    InvalidRecordSize {
        /// Payload size declared in the record header.
        declared: usize,
        /// Payload bytes actually present (frame length minus header).
        actual: usize,
    },

    /// The file signature is not a recognized tidelog signature.
    #[error("invalid file signature: {found:?}")]
    InvalidSignature {
        /// The three signature bytes found.
        found: [u8; 3],
    },

    /// A snapshot frame has the wrong length.
    #[error("invalid snapshot: expected {expected} bytes, got {actual}")]
    InvalidSnapshot {
        /// Required frame length.
        expected: usize,
        /// Length of the buffer given.
        actual: usize,
    },
}

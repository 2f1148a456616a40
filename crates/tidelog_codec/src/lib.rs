//! # tidelog codec
//!
//! Binary frame codec for tidelog file pairs.
//!
//! This crate owns the bit-exact layout of everything tidelog puts on
//! disk: the 16-byte file headers, the 24-byte record headers, the
//! 24-byte index entries and the 24-byte snapshot frames. It performs no
//! I/O; the engine crates feed it buffers.
//!
//! All integers are little-endian. Encoding is deterministic: identical
//! inputs always produce identical bytes, which keeps the engine's
//! rolling digest stable across platforms.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frames;
pub mod raw;

pub use error::{CodecError, CodecResult};
pub use frames::{
    encode_record_header, FileHeader, IndexEntry, Record, Signature, Snapshot, FILE_HEADER_SIZE,
    INDEX_ENTRY_SIZE, INDEX_SIGNATURE, LOG_SIGNATURE, RECORD_HEADER_SIZE, SNAPSHOT_SIZE,
};

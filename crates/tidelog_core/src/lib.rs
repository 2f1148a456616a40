//! # tidelog core
//!
//! An append-only, immutable write-ahead log over a local file pair.
//!
//! A log is two files: a **data file** of variable-length records in
//! write order, and an **index file** of fixed 24-byte entries mapping
//! each dense record index to the record's byte offset. Appends stamp a
//! monotonic timestamp and the next index, push the record through a
//! configurable write pipeline (sync-per-write or sync-on-close, with
//! optional buffering), append the matching index entry and advance a
//! rolling 64-bit digest over the entry stream.
//!
//! ## Example
//!
//! ```no_run
//! use tidelog_core::{Config, Log, SyncStrategy};
//! use std::path::Path;
//!
//! let config = Config::new().strategy(SyncStrategy::SyncOnWrite);
//! let log = Log::create(Path::new("/tmp/events.log"), config).unwrap();
//! log.open().unwrap();
//!
//! log.write(b"first record").unwrap();
//!
//! let mut cursor = log.cursor().unwrap();
//! let record = cursor.seek(0).unwrap();
//! assert_eq!(record.data, b"first record");
//! ```
//!
//! ## Guarantees
//!
//! - record indices are dense and start at 0
//! - record timestamps never decrease
//! - a record becomes visible to readers only after its index entry
//! - recovery truncates torn tail writes on either file, never
//!   surfacing a partial record
//! - the log is single-writer: in-process writes serialize behind one
//!   mutex, and an advisory file lock keeps other processes out

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod cursor;
mod error;
mod index;
mod log;
mod pipeline;

pub use config::{Config, DEFAULT_MAX_RECORD_SIZE, VERSION_ONE};
pub use cursor::Cursor;
pub use error::{LogError, LogResult};
pub use index::{IndexSlice, LogIndex, MAX_SLICE};
pub use log::{Log, LogState, Metadata};
pub use pipeline::SyncStrategy;

// Wire types are defined by the codec crate and re-exported here so most
// users only depend on tidelog_core.
pub use tidelog_codec::{
    FileHeader, IndexEntry, Record, Signature, Snapshot, FILE_HEADER_SIZE, INDEX_ENTRY_SIZE,
    RECORD_HEADER_SIZE, SNAPSHOT_SIZE,
};

//! The WAL engine: open/create, the write path, snapshots, recovery.
//!
//! A log is a pair of files: the data file holds variable-length records
//! in write order, the index file holds one 24-byte entry per record.
//! The engine owns both write pipelines and serializes writers with one
//! mutex, so each record's (data-write, index-append, digest) triple is
//! atomic with respect to other writers. Cursors read through their own
//! file handle and only touch the index's atomic count lock-free.
//!
//! ## Recovery
//!
//! The data file is authoritative for the bytes present. At open (and on
//! [`Log::recover`]) the engine drops trailing index entries whose record
//! does not fully fit inside the data file, then truncates the data file
//! back to the end of the last indexed record. Partial tail writes are
//! never surfaced to readers. The rolling digest is rebuilt by streaming
//! the surviving index entries, so a snapshot taken after reopening
//! matches one taken after a clean close.

use crate::config::{Config, VERSION_ONE};
use crate::cursor::Cursor;
use crate::error::{LogError, LogResult};
use crate::index::{IndexOptions, LogIndex};
use crate::pipeline::{SyncStrategy, WritePipeline};
use crc64fast::Digest;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tidelog_codec::{
    encode_record_header, CodecError, FileHeader, IndexEntry, Signature, Snapshot,
    FILE_HEADER_SIZE, INDEX_ENTRY_SIZE, RECORD_HEADER_SIZE,
};
use tidelog_storage::{ByteStore, FileStore, OpenMode};

/// Lifecycle state of a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    /// Created but not yet opened for writing.
    Unopened,
    /// Accepting writes.
    Open,
    /// Closed; all further writes fail.
    Closed,
}

/// Descriptive information about a log's files.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Path of the data file.
    pub path: PathBuf,
    /// Path of the index file.
    pub index_path: PathBuf,
    /// Data file size in bytes, header included.
    pub size: u64,
    /// Index file size in bytes, header included.
    pub index_size: u64,
    /// Last modification time of the data file, nanoseconds since the
    /// Unix epoch.
    pub last_modified: i64,
}

/// Mutable engine state, all behind the write mutex.
struct Engine {
    pipeline: WritePipeline,
    state: LogState,
    /// Set when the data and index files diverged mid-write; cleared by
    /// recovery.
    poisoned: bool,
    /// Logical data file size: header plus every record written,
    /// buffered bytes included.
    size: u64,
    last_write_time: i64,
    next_index: u64,
    digest: Digest,
    record_buf: Vec<u8>,
    entry_buf: [u8; INDEX_ENTRY_SIZE],
}

/// An append-only write-ahead log over a data/index file pair.
pub struct Log {
    path: PathBuf,
    index_path: PathBuf,
    header: FileHeader,
    max_record_size: usize,
    index: Arc<LogIndex>,
    inner: Mutex<Engine>,
}

impl Log {
    /// Opens or creates the log at `path`.
    ///
    /// The matching index file lives beside it at `<path>.idx`. An
    /// existing data file has its header validated and its version,
    /// flags and TTL replace the config's; recovery then reconciles the
    /// pair. The log starts in [`LogState::Unopened`]; call
    /// [`Log::open`] before writing.
    ///
    /// # Errors
    ///
    /// Configuration problems (`InvalidTtl`, `InvalidLogStrategy`,
    /// `InvalidMaxRecordSize`), another process holding the write lock
    /// (`LogLocked`), header validation failures
    /// (`InvalidFileSignature`, `InvalidFileVersion`) and I/O errors.
    pub fn create(path: &Path, config: Config) -> LogResult<Self> {
        let strategy = config.validate()?;

        let store = FileStore::open_with(
            path,
            &OpenMode {
                mode: config.file_mode,
                truncate: config.truncate,
            },
        )?;
        if !store.try_lock_exclusive()? {
            return Err(LogError::LogLocked);
        }

        let size = store.size()?;
        if size >= FILE_HEADER_SIZE as u64 {
            let buf =
                store
                    .read_at(0, FILE_HEADER_SIZE)
                    .map_err(|err| LogError::ReadLogHeader {
                        message: err.to_string(),
                    })?;
            let header = match FileHeader::decode(&buf) {
                Ok(header) => header,
                Err(CodecError::InvalidSignature { found }) => {
                    return Err(LogError::InvalidFileSignature { found })
                }
                Err(err) => return Err(err.into()),
            };
            if header.signature != Signature::Log {
                return Err(LogError::InvalidFileSignature {
                    found: header.signature.as_bytes(),
                });
            }
            Self::dispatch(store, path, header, &config, strategy)
        } else {
            let mut store = store;
            if size > 0 {
                // A torn header write; nothing in the file is usable.
                store.truncate(0)?;
            }
            let header = FileHeader::new(Signature::Log, config.version, config.flags, config.ttl);
            let mut buf = [0u8; FILE_HEADER_SIZE];
            header.encode(&mut buf)?;
            store
                .append(&buf)
                .and_then(|_| store.sync())
                .map_err(|err| LogError::WriteLogHeader {
                    message: err.to_string(),
                })?;
            Self::dispatch(store, path, header, &config, strategy)
        }
    }

    /// Version dispatch: hands the opened data file to the matching
    /// engine.
    fn dispatch(
        store: FileStore,
        path: &Path,
        header: FileHeader,
        config: &Config,
        strategy: SyncStrategy,
    ) -> LogResult<Self> {
        match header.version {
            VERSION_ONE => Self::open_v1(store, path, header, config, strategy),
            found => Err(LogError::InvalidFileVersion { found }),
        }
    }

    fn open_v1(
        store: FileStore,
        path: &Path,
        header: FileHeader,
        config: &Config,
        strategy: SyncStrategy,
    ) -> LogResult<Self> {
        let index_path = index_path_for(path);
        let index = LogIndex::open(
            &index_path,
            &IndexOptions {
                version: header.version,
                flags: header.flags,
                ttl: header.ttl,
                strategy,
                write_buffer: config.write_buffer,
                file_mode: config.file_mode,
            },
        )?;
        let index = Arc::new(index);

        let data_size = store.size()?;
        let engine = Engine {
            pipeline: WritePipeline::new(Box::new(store), strategy, config.write_buffer),
            state: LogState::Unopened,
            poisoned: false,
            size: data_size,
            last_write_time: 0,
            next_index: 0,
            digest: Digest::new(),
            record_buf: vec![0u8; config.max_record_size + RECORD_HEADER_SIZE],
            entry_buf: [0u8; INDEX_ENTRY_SIZE],
        };

        let log = Self {
            path: path.to_path_buf(),
            index_path,
            header,
            max_record_size: config.max_record_size,
            index,
            inner: Mutex::new(engine),
        };

        {
            let mut engine = log.inner.lock();
            reconcile(&mut engine, &log.index, &log.path)?;
        }
        tracing::debug!(
            path = %log.path.display(),
            records = log.index.size(),
            "log opened"
        );
        Ok(log)
    }

    /// Transitions the log from [`LogState::Unopened`] to
    /// [`LogState::Open`]; any other state fails with
    /// [`LogError::LogAlreadyOpen`].
    pub fn open(&self) -> LogResult<()> {
        let mut engine = self.inner.lock();
        if engine.state != LogState::Unopened {
            return Err(LogError::LogAlreadyOpen);
        }
        engine.state = LogState::Open;
        Ok(())
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LogState {
        self.inner.lock().state
    }

    /// The file header shared by the pair (version, flags, TTL).
    #[must_use]
    pub fn header(&self) -> FileHeader {
        self.header
    }

    /// The index half of the pair, for slice lookups.
    #[must_use]
    pub fn index(&self) -> &LogIndex {
        &self.index
    }

    /// Appends `data` as one record, returning the bytes written
    /// (`24 + data.len()`).
    ///
    /// The record is stamped with a monotonically non-decreasing
    /// timestamp and the next dense index, pushed through the data
    /// pipeline, and its index entry is appended and folded into the
    /// rolling digest. Under `SyncOnWrite` the call returns only after
    /// the bytes reached stable storage.
    pub fn write(&self, data: &[u8]) -> LogResult<usize> {
        let mut guard = self.inner.lock();
        let engine = &mut *guard;

        if engine.state != LogState::Open {
            return Err(LogError::LogClosed);
        }
        if engine.poisoned {
            return Err(LogError::write_log_record(
                "log is inconsistent; recovery required",
            ));
        }
        if data.len() > self.max_record_size {
            return Err(LogError::RecordTooLarge {
                size: data.len(),
                max: self.max_record_size,
            });
        }

        // Clamp against clock regressions so record times never decrease.
        let time = now_ns().max(engine.last_write_time);
        let index = engine.next_index;
        let offset = engine.size;
        let total = RECORD_HEADER_SIZE + data.len();

        #[allow(clippy::cast_possible_truncation)]
        encode_record_header(
            &mut engine.record_buf,
            data.len() as u32,
            self.header.flags,
            time,
            index,
        )?;
        engine.record_buf[RECORD_HEADER_SIZE..total].copy_from_slice(data);
        engine.pipeline.write(&engine.record_buf[..total])?;

        let entry = IndexEntry {
            time,
            index,
            offset: offset as i64,
        };
        entry.encode(&mut engine.entry_buf)?;
        if let Err(err) = self.index.append(&engine.entry_buf) {
            // The record landed but its entry did not: the pair has
            // diverged and the next open must reconcile it.
            engine.poisoned = true;
            return Err(LogError::write_log_record(err));
        }

        engine.digest.write(&engine.entry_buf);
        engine.size += total as u64;
        engine.last_write_time = time;
        engine.next_index += 1;

        Ok(total)
    }

    /// Returns a cursor positioned at record 0.
    ///
    /// The data pipeline is flushed first so every indexed record is
    /// visible to the cursor's own read handle.
    pub fn cursor(&self) -> LogResult<Cursor> {
        self.inner.lock().pipeline.flush()?;
        let file = File::open(&self.path)?;
        Ok(Cursor::new(
            Arc::clone(&self.index),
            file,
            self.max_record_size,
        ))
    }

    /// Captures the log state: last write time, data byte size, rolling
    /// digest. Two snapshots without an intervening write are identical.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let engine = self.inner.lock();
        Snapshot {
            time: engine.last_write_time,
            size: engine.size,
            hash: engine.digest.sum64(),
        }
    }

    /// Descriptive information about the file pair.
    pub fn metadata(&self) -> LogResult<Metadata> {
        let size = self.inner.lock().size;
        let index_size = self.index.byte_size()?;
        let modified = std::fs::metadata(&self.path)?.modified()?;
        Ok(Metadata {
            path: self.path.clone(),
            index_path: self.index_path.clone(),
            size,
            index_size,
            last_modified: system_time_ns(modified),
        })
    }

    /// Serializes records `[offset, offset + limit)` into `sink`,
    /// clamped to the end of the log. TTL-expired records are emitted
    /// like any other. The first error is surfaced.
    pub fn pipe<W: Write>(&self, offset: u64, limit: u64, sink: &mut W) -> LogResult<()> {
        if limit == 0 {
            return Ok(());
        }
        let end = offset.saturating_add(limit).min(self.index.size());
        let mut cursor = self.cursor()?;
        let mut frame = Vec::new();

        let mut pos = offset;
        while pos < end {
            let record = if pos == offset {
                cursor.seek(offset)?
            } else {
                cursor.next()?
            };
            frame.resize(record.encoded_len(), 0);
            record.encode(&mut frame)?;
            sink.write_all(&frame)?;
            pos += 1;
        }
        Ok(())
    }

    /// Reconciles the data and index files to a matching prefix.
    ///
    /// Runs automatically when the log is created over existing files;
    /// callable afterwards to repair a log that reported
    /// [`LogError::WriteLogRecord`]. Unflushed buffered data is flushed
    /// first, then trailing partial writes on either file are truncated
    /// away and the rolling digest is rebuilt.
    pub fn recover(&self) -> LogResult<()> {
        let mut engine = self.inner.lock();
        reconcile(&mut engine, &self.index, &self.path)
    }

    /// Flushes and closes both files, transitioning to
    /// [`LogState::Closed`]. Best-effort: both files are attempted and
    /// the first error is reported. Subsequent writes fail with
    /// [`LogError::LogClosed`].
    pub fn close(&self) -> LogResult<()> {
        let mut engine = self.inner.lock();
        if engine.state == LogState::Closed {
            return Ok(());
        }
        engine.state = LogState::Closed;

        let data_result = engine.pipeline.close();
        let index_result = self.index.close();
        tracing::debug!(path = %self.path.display(), "log closed");
        data_result?;
        index_result?;
        Ok(())
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("path", &self.path)
            .field("state", &self.state())
            .field("records", &self.index.size())
            .finish_non_exhaustive()
    }
}

/// The index file sits beside the data file with an extra `.idx` suffix.
fn index_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".idx");
    PathBuf::from(name)
}

#[allow(clippy::cast_possible_truncation)]
fn now_ns() -> i64 {
    system_time_ns(SystemTime::now())
}

#[allow(clippy::cast_possible_truncation)]
fn system_time_ns(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Brings the pair back to a consistent prefix and rebuilds the digest
/// and counters. See the module docs for the policy.
fn reconcile(engine: &mut Engine, index: &LogIndex, path: &Path) -> LogResult<()> {
    engine.pipeline.flush()?;
    index.flush()?;

    let data_size = engine.pipeline.store_size()?;
    let indexed = index.size();
    let mut count = indexed;
    let mut end = FILE_HEADER_SIZE as u64;

    // Walk back over entries whose record does not fully fit in the data
    // file. Offsets below the header mark a corrupt entry and drop it
    // too.
    while count > 0 {
        let entry = index.entry(count - 1)?;
        if entry.offset >= FILE_HEADER_SIZE as i64 {
            let offset = entry.offset as u64;
            if offset + RECORD_HEADER_SIZE as u64 <= data_size {
                let header = engine
                    .pipeline
                    .read_at(offset, RECORD_HEADER_SIZE)
                    .map_err(LogError::read_log_record)?;
                let size = u64::from(tidelog_codec::raw::read_u32(&header, 0)?);
                let record_end = offset + RECORD_HEADER_SIZE as u64 + size;
                if record_end <= data_size {
                    end = record_end;
                    break;
                }
            }
        }
        count -= 1;
    }

    if count < indexed {
        tracing::warn!(
            path = %path.display(),
            dropped = indexed - count,
            "dropping index entries past the data file"
        );
        index.truncate_entries(count)?;
    }
    if end < data_size {
        tracing::warn!(
            path = %path.display(),
            dropped = data_size - end,
            "truncating unindexed data file tail"
        );
        engine.pipeline.truncate(end)?;
    }

    let mut digest = Digest::new();
    index.replay_entries(|chunk| digest.write(chunk))?;

    engine.digest = digest;
    engine.size = end;
    engine.next_index = count;
    engine.last_write_time = if count > 0 {
        index.entry(count - 1)?.time
    } else {
        0
    };
    engine.poisoned = false;
    Ok(())
}

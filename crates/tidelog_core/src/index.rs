//! The index file: one fixed-width entry per record.
//!
//! The index is the canonical summary of the log. Entries are written
//! strictly in record order, the in-memory count is the only field
//! readers touch without the write mutex, and slices are positional reads
//! over the entry region.

use crate::config::VERSION_ONE;
use crate::error::{LogError, LogResult};
use crate::pipeline::{SyncStrategy, WritePipeline};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tidelog_codec::{
    CodecError, FileHeader, IndexEntry, Signature, FILE_HEADER_SIZE, INDEX_ENTRY_SIZE,
};
use tidelog_storage::{ByteStore, FileStore, OpenMode};

/// Maximum number of entries a single slice can hold.
pub const MAX_SLICE: u64 = 32_000;

/// Read chunk used when streaming the entry region.
const REPLAY_CHUNK: usize = 64 * 1024;

/// Options the engine passes when opening the index half of a pair.
///
/// Version, flags and TTL always mirror the data file so the pair stays
/// consistent; strategy and buffering mirror the data pipeline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexOptions {
    pub version: u8,
    pub flags: u32,
    pub ttl: i64,
    pub strategy: SyncStrategy,
    pub write_buffer: usize,
    pub file_mode: u32,
}

/// The index file of a log pair.
pub struct LogIndex {
    path: PathBuf,
    header: FileHeader,
    pipeline: Mutex<WritePipeline>,
    count: AtomicU64,
}

impl LogIndex {
    /// Opens or creates the index file at `path`.
    ///
    /// A new file gets a 16-byte `IDX` header. An existing file has its
    /// header validated and its record count reconstructed from the last
    /// full entry; a partial tail entry is truncated away.
    pub(crate) fn open(path: &Path, opts: &IndexOptions) -> LogResult<Self> {
        let store = FileStore::open_with(
            path,
            &OpenMode {
                mode: opts.file_mode,
                truncate: false,
            },
        )?;
        let size = store.size()?;
        let mut store: Box<dyn ByteStore> = Box::new(store);

        let header;
        let mut count = 0u64;

        if size >= FILE_HEADER_SIZE as u64 {
            let buf = store
                .read_at(0, FILE_HEADER_SIZE)
                .map_err(|err| LogError::ReadIndexHeader {
                    message: err.to_string(),
                })?;
            header = match FileHeader::decode(&buf) {
                Ok(header) => header,
                Err(CodecError::InvalidSignature { found }) => {
                    return Err(LogError::InvalidFileSignature { found })
                }
                Err(err) => return Err(err.into()),
            };
            if header.signature != Signature::Index {
                return Err(LogError::InvalidFileSignature {
                    found: header.signature.as_bytes(),
                });
            }
            if header.version != VERSION_ONE {
                return Err(LogError::InvalidFileVersion {
                    found: header.version,
                });
            }

            let body = size - FILE_HEADER_SIZE as u64;
            let full_entries = body / INDEX_ENTRY_SIZE as u64;
            let boundary = FILE_HEADER_SIZE as u64 + full_entries * INDEX_ENTRY_SIZE as u64;
            if boundary < size {
                tracing::warn!(
                    path = %path.display(),
                    dropped = size - boundary,
                    "truncating partial index entry"
                );
                store.truncate(boundary)?;
            }
            if full_entries > 0 {
                let tail = store
                    .read_at(boundary - INDEX_ENTRY_SIZE as u64, INDEX_ENTRY_SIZE)
                    .map_err(|_| LogError::ReadIndexRecord)?;
                let entry = IndexEntry::decode(&tail)?;
                count = entry.index + 1;
            }
        } else {
            if size > 0 {
                // A torn header write; nothing in the file is usable.
                store.truncate(0)?;
            }
            header = FileHeader::new(Signature::Index, opts.version, opts.flags, opts.ttl);
            let mut buf = [0u8; FILE_HEADER_SIZE];
            header.encode(&mut buf)?;
            store
                .append(&buf)
                .and_then(|_| store.sync())
                .map_err(|err| LogError::WriteIndexHeader {
                    message: err.to_string(),
                })?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            pipeline: Mutex::new(WritePipeline::new(store, opts.strategy, opts.write_buffer)),
            count: AtomicU64::new(count),
        })
    }

    /// Appends one pre-encoded entry.
    ///
    /// The count is incremented only after the entry went through the
    /// pipeline; a failed append leaves it untouched.
    pub(crate) fn append(&self, entry_bytes: &[u8; INDEX_ENTRY_SIZE]) -> LogResult<usize> {
        let mut pipeline = self.pipeline.lock();
        pipeline.write(entry_bytes)?;
        self.count.fetch_add(1, Ordering::Release);
        Ok(INDEX_ENTRY_SIZE)
    }

    /// Returns a read view of `min(limit, MAX_SLICE, size() - offset)`
    /// entries starting at record index `offset`.
    ///
    /// Buffered writes are flushed first so the slice covers everything
    /// visible at call time. `limit < 1` or `offset >= size()` fail with
    /// [`LogError::SliceOutOfBounds`].
    pub fn slice(&self, offset: u64, limit: u64) -> LogResult<IndexSlice> {
        if limit < 1 {
            return Err(LogError::SliceOutOfBounds {
                offset,
                count: self.size(),
            });
        }

        let mut pipeline = self.pipeline.lock();
        pipeline.flush()?;
        let count = self.count.load(Ordering::Acquire);
        if offset >= count {
            return Err(LogError::SliceOutOfBounds { offset, count });
        }

        let take = limit.min(MAX_SLICE).min(count - offset);
        let pos = FILE_HEADER_SIZE as u64 + offset * INDEX_ENTRY_SIZE as u64;
        let buf = pipeline
            .read_at(pos, take as usize * INDEX_ENTRY_SIZE)
            .map_err(LogError::read_index)?;

        Ok(IndexSlice {
            buf,
            len: take as usize,
        })
    }

    /// Number of entries, which equals the number of records in the data
    /// file.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Byte size of the index file, buffered writes included.
    pub fn byte_size(&self) -> LogResult<u64> {
        let mut pipeline = self.pipeline.lock();
        pipeline.flush()?;
        pipeline.store_size()
    }

    /// The file header the index was opened with.
    #[must_use]
    pub fn header(&self) -> FileHeader {
        self.header
    }

    /// Path of the index file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes buffered entries to the OS (and syncs under
    /// `SyncOnWrite`).
    pub fn flush(&self) -> LogResult<()> {
        self.pipeline.lock().flush()
    }

    /// Flushes and syncs the index file.
    pub(crate) fn close(&self) -> LogResult<()> {
        self.pipeline.lock().close()
    }

    /// Reads entry `k` directly from the file.
    pub(crate) fn entry(&self, k: u64) -> LogResult<IndexEntry> {
        let count = self.size();
        if k >= count {
            return Err(LogError::SliceOutOfBounds { offset: k, count });
        }
        let pipeline = self.pipeline.lock();
        let pos = FILE_HEADER_SIZE as u64 + k * INDEX_ENTRY_SIZE as u64;
        let buf = pipeline
            .read_at(pos, INDEX_ENTRY_SIZE)
            .map_err(|_| LogError::ReadIndexRecord)?;
        Ok(IndexEntry::decode(&buf)?)
    }

    /// Streams the entry region (file bytes past the header) through `f`
    /// in bounded chunks. Used to rebuild the rolling digest at open.
    pub(crate) fn replay_entries<F: FnMut(&[u8])>(&self, mut f: F) -> LogResult<()> {
        let mut pipeline = self.pipeline.lock();
        pipeline.flush()?;
        let total = pipeline.store_size()?;
        let mut pos = FILE_HEADER_SIZE as u64;
        while pos < total {
            let len = REPLAY_CHUNK.min((total - pos) as usize);
            let chunk = pipeline.read_at(pos, len).map_err(LogError::read_index)?;
            f(&chunk);
            pos += len as u64;
        }
        Ok(())
    }

    /// Drops all entries past `new_count` and resets the count. Used by
    /// recovery when the data file is shorter than the index claims.
    pub(crate) fn truncate_entries(&self, new_count: u64) -> LogResult<()> {
        let mut pipeline = self.pipeline.lock();
        pipeline.flush()?;
        pipeline.truncate(FILE_HEADER_SIZE as u64 + new_count * INDEX_ENTRY_SIZE as u64)?;
        self.count.store(new_count, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogIndex")
            .field("path", &self.path)
            .field("count", &self.size())
            .finish_non_exhaustive()
    }
}

/// A contiguous, immutable, in-memory view of a range of index entries.
#[derive(Debug, Clone)]
pub struct IndexSlice {
    buf: Vec<u8>,
    len: usize,
}

impl IndexSlice {
    /// Number of entries in the slice.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the slice holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decodes entry `k` of the slice.
    pub fn get(&self, k: usize) -> LogResult<IndexEntry> {
        if k >= self.len {
            return Err(LogError::SliceOutOfBounds {
                offset: k as u64,
                count: self.len as u64,
            });
        }
        let start = k * INDEX_ENTRY_SIZE;
        Ok(IndexEntry::decode(&self.buf[start..start + INDEX_ENTRY_SIZE])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options() -> IndexOptions {
        IndexOptions {
            version: VERSION_ONE,
            flags: 0,
            ttl: 0,
            strategy: SyncStrategy::NoSyncOnWrite,
            write_buffer: 0,
            file_mode: 0o600,
        }
    }

    fn entry_bytes(entry: &IndexEntry) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        entry.encode(&mut buf).unwrap();
        buf
    }

    fn append_entries(index: &LogIndex, n: u64) {
        for k in 0..n {
            let entry = IndexEntry {
                time: 1_000 + k as i64,
                index: k,
                offset: (FILE_HEADER_SIZE as u64 + k * 32) as i64,
            };
            index.append(&entry_bytes(&entry)).unwrap();
        }
    }

    #[test]
    fn new_index_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.idx");

        let index = LogIndex::open(&path, &options()).unwrap();
        assert_eq!(index.size(), 0);
        assert_eq!(index.byte_size().unwrap(), FILE_HEADER_SIZE as u64);
        assert_eq!(index.header().signature, Signature::Index);
        assert_eq!(index.header().version, VERSION_ONE);
    }

    #[test]
    fn append_increments_count() {
        let dir = tempdir().unwrap();
        let index = LogIndex::open(&dir.path().join("log.idx"), &options()).unwrap();

        append_entries(&index, 3);
        assert_eq!(index.size(), 3);
        assert_eq!(
            index.byte_size().unwrap(),
            (FILE_HEADER_SIZE + 3 * INDEX_ENTRY_SIZE) as u64
        );
    }

    #[test]
    fn reopen_reconstructs_count_from_last_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.idx");

        {
            let index = LogIndex::open(&path, &options()).unwrap();
            append_entries(&index, 7);
            index.close().unwrap();
        }

        let index = LogIndex::open(&path, &options()).unwrap();
        assert_eq!(index.size(), 7);
        assert_eq!(index.entry(6).unwrap().index, 6);
    }

    #[test]
    fn reopen_truncates_partial_tail_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.idx");

        {
            let index = LogIndex::open(&path, &options()).unwrap();
            append_entries(&index, 2);
            index.close().unwrap();
        }

        // Simulate a torn write: append half an entry.
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0xAB; 11]).unwrap();
        }

        let index = LogIndex::open(&path, &options()).unwrap();
        assert_eq!(index.size(), 2);
        assert_eq!(
            index.byte_size().unwrap(),
            (FILE_HEADER_SIZE + 2 * INDEX_ENTRY_SIZE) as u64
        );
    }

    #[test]
    fn reopen_truncates_partial_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.idx");

        std::fs::write(&path, b"IDX").unwrap();

        let index = LogIndex::open(&path, &options()).unwrap();
        assert_eq!(index.size(), 0);
        assert_eq!(index.byte_size().unwrap(), FILE_HEADER_SIZE as u64);
    }

    #[test]
    fn wrong_signature_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.idx");

        let mut buf = [0u8; FILE_HEADER_SIZE];
        FileHeader::new(Signature::Log, VERSION_ONE, 0, 0)
            .encode(&mut buf)
            .unwrap();
        std::fs::write(&path, buf).unwrap();

        assert!(matches!(
            LogIndex::open(&path, &options()),
            Err(LogError::InvalidFileSignature { .. })
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.idx");

        let mut buf = [0u8; FILE_HEADER_SIZE];
        FileHeader::new(Signature::Index, VERSION_ONE, 0, 0)
            .encode(&mut buf)
            .unwrap();
        buf[3] = 9;
        std::fs::write(&path, buf).unwrap();

        assert!(matches!(
            LogIndex::open(&path, &options()),
            Err(LogError::InvalidFileVersion { found: 9 })
        ));
    }

    #[test]
    fn slice_returns_requested_entries() {
        let dir = tempdir().unwrap();
        let index = LogIndex::open(&dir.path().join("log.idx"), &options()).unwrap();
        append_entries(&index, 100);

        let slice = index.slice(0, 5).unwrap();
        assert_eq!(slice.len(), 5);
        for k in 0..5 {
            let entry = slice.get(k).unwrap();
            assert_eq!(entry.index, k as u64);
        }

        let slice = index.slice(90, 50_000).unwrap();
        assert_eq!(slice.len(), 10);
        assert_eq!(slice.get(0).unwrap().index, 90);
    }

    #[test]
    fn slice_bounds() {
        let dir = tempdir().unwrap();
        let index = LogIndex::open(&dir.path().join("log.idx"), &options()).unwrap();
        append_entries(&index, 10);

        assert!(matches!(
            index.slice(10, 1),
            Err(LogError::SliceOutOfBounds { .. })
        ));
        assert!(matches!(
            index.slice(0, 0),
            Err(LogError::SliceOutOfBounds { .. })
        ));

        let slice = index.slice(0, 10).unwrap();
        assert!(matches!(
            slice.get(10),
            Err(LogError::SliceOutOfBounds { .. })
        ));
    }

    #[test]
    fn slice_sees_buffered_entries() {
        let dir = tempdir().unwrap();
        let mut opts = options();
        opts.write_buffer = 4 * 1024;
        let index = LogIndex::open(&dir.path().join("log.idx"), &opts).unwrap();

        append_entries(&index, 3);
        let slice = index.slice(0, 10).unwrap();
        assert_eq!(slice.len(), 3);
        assert_eq!(slice.get(2).unwrap().index, 2);
    }

    #[test]
    fn truncate_entries_drops_tail() {
        let dir = tempdir().unwrap();
        let index = LogIndex::open(&dir.path().join("log.idx"), &options()).unwrap();
        append_entries(&index, 5);

        index.truncate_entries(2).unwrap();
        assert_eq!(index.size(), 2);
        assert!(matches!(
            index.slice(2, 1),
            Err(LogError::SliceOutOfBounds { .. })
        ));
    }

    #[test]
    fn replay_streams_exact_entry_bytes() {
        let dir = tempdir().unwrap();
        let index = LogIndex::open(&dir.path().join("log.idx"), &options()).unwrap();
        append_entries(&index, 4);

        let mut streamed = Vec::new();
        index.replay_entries(|chunk| streamed.extend_from_slice(chunk)).unwrap();
        assert_eq!(streamed.len(), 4 * INDEX_ENTRY_SIZE);
        assert_eq!(IndexEntry::decode(&streamed[0..24]).unwrap().index, 0);
        assert_eq!(IndexEntry::decode(&streamed[72..96]).unwrap().index, 3);
    }
}

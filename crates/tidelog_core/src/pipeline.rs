//! Write pipeline: durability strategy plus optional buffering over a
//! byte store.
//!
//! The middleware set is closed, so the pipeline is a concrete struct
//! rather than a stack of boxed writers: the store is the terminal
//! writer, the sync strategy sits directly above it, and an optional
//! fixed-capacity buffer sits on top. With buffering enabled, syncs are
//! observed per flush rather than per record.

use crate::error::{LogError, LogResult};
use tidelog_storage::ByteStore;

/// When appended bytes are forced to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Every successful write (or buffer flush) is followed by a sync
    /// before the call returns. A sync failure fails the same call.
    SyncOnWrite,
    /// Writes land in the OS page cache; the file is synced on close.
    NoSyncOnWrite,
}

struct WriteBuffer {
    data: Vec<u8>,
    capacity: usize,
}

/// The write path of one file: store, durability strategy, optional
/// buffer.
pub(crate) struct WritePipeline {
    store: Box<dyn ByteStore>,
    strategy: SyncStrategy,
    buffer: Option<WriteBuffer>,
}

impl WritePipeline {
    /// Builds a pipeline; `buffer_capacity` of 0 disables buffering.
    pub(crate) fn new(
        store: Box<dyn ByteStore>,
        strategy: SyncStrategy,
        buffer_capacity: usize,
    ) -> Self {
        let buffer = (buffer_capacity > 0).then(|| WriteBuffer {
            data: Vec::with_capacity(buffer_capacity),
            capacity: buffer_capacity,
        });
        Self {
            store,
            strategy,
            buffer,
        }
    }

    /// Writes `data` through the pipeline, returning the byte count.
    ///
    /// Unbuffered: appends to the store and, under
    /// [`SyncStrategy::SyncOnWrite`], syncs before returning. Buffered: a
    /// single write larger than the buffer capacity fails with
    /// [`LogError::BufferTooLarge`] leaving previously buffered bytes
    /// untouched; a write that would overflow the remaining space flushes
    /// first.
    pub(crate) fn write(&mut self, data: &[u8]) -> LogResult<usize> {
        let Some(buf) = &self.buffer else {
            self.store.append(data)?;
            if self.strategy == SyncStrategy::SyncOnWrite {
                self.store.sync()?;
            }
            return Ok(data.len());
        };

        if data.len() > buf.capacity {
            return Err(LogError::BufferTooLarge {
                len: data.len(),
                capacity: buf.capacity,
            });
        }
        if buf.data.len() + data.len() > buf.capacity {
            self.flush()?;
        }
        let buf = self.buffer.as_mut().expect("buffering enabled above");
        buf.data.extend_from_slice(data);
        Ok(data.len())
    }

    /// Drains the buffer into the store, pushes writes to the OS, and
    /// syncs under [`SyncStrategy::SyncOnWrite`].
    pub(crate) fn flush(&mut self) -> LogResult<()> {
        if let Some(buf) = &mut self.buffer {
            if !buf.data.is_empty() {
                self.store.append(&buf.data)?;
                buf.data.clear();
            }
        }
        self.store.flush()?;
        if self.strategy == SyncStrategy::SyncOnWrite {
            self.store.sync()?;
        }
        Ok(())
    }

    /// Flushes and forces everything to stable storage regardless of the
    /// strategy. Used on close.
    pub(crate) fn close(&mut self) -> LogResult<()> {
        self.flush()?;
        if self.strategy == SyncStrategy::NoSyncOnWrite {
            self.store.sync()?;
        }
        Ok(())
    }

    /// Positional read against the store. Buffered but unflushed bytes
    /// are not visible; callers flush first when they need them.
    pub(crate) fn read_at(&self, offset: u64, len: usize) -> LogResult<Vec<u8>> {
        Ok(self.store.read_at(offset, len)?)
    }

    /// Size of the store, excluding any buffered bytes.
    pub(crate) fn store_size(&self) -> LogResult<u64> {
        Ok(self.store.size()?)
    }

    /// Discards buffered bytes and truncates the store to `new_size`.
    pub(crate) fn truncate(&mut self, new_size: u64) -> LogResult<()> {
        if let Some(buf) = &mut self.buffer {
            buf.data.clear();
        }
        self.store.truncate(new_size)?;
        Ok(())
    }
}

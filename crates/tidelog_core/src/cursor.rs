//! Forward cursor over log records.

use crate::error::{LogError, LogResult};
use crate::index::{IndexSlice, LogIndex, MAX_SLICE};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tidelog_codec::{raw, Record, RECORD_HEADER_SIZE};

/// A forward iterator over the records of a log.
///
/// Cursors hold their own read handle on the data file and a shared
/// reference to the index, so they never block the writer beyond the
/// index's brief flush-and-count critical section.
///
/// Records returned by [`Cursor::seek`] and [`Cursor::next`] borrow the
/// cursor's internal scratch buffer; the borrow ends at the next cursor
/// call, which the lifetimes enforce.
pub struct Cursor {
    index: Arc<LogIndex>,
    file: File,
    slice: Option<IndexSlice>,
    slice_pos: usize,
    position: u64,
    buf: Vec<u8>,
    max_record_size: usize,
}

impl Cursor {
    pub(crate) fn new(index: Arc<LogIndex>, file: File, max_record_size: usize) -> Self {
        Self {
            index,
            file,
            slice: None,
            slice_pos: 0,
            position: 0,
            buf: vec![0u8; max_record_size + RECORD_HEADER_SIZE],
            max_record_size,
        }
    }

    /// Moves the cursor to record `offset` and returns that record.
    ///
    /// Fails with [`LogError::SliceOutOfBounds`] when `offset` is at or
    /// past the end of the log.
    pub fn seek(&mut self, offset: u64) -> LogResult<Record<'_>> {
        let slice = self.index.slice(offset, MAX_SLICE)?;
        self.slice = Some(slice);
        self.slice_pos = 0;
        self.position = offset;
        self.next()
    }

    /// Returns the record at the cursor position and advances.
    ///
    /// At the end of the log this fails with
    /// [`LogError::SliceOutOfBounds`]. Transient read failures
    /// ([`LogError::ReadLogRecord`]) do not invalidate the cursor; the
    /// caller may retry or re-seek.
    pub fn next(&mut self) -> LogResult<Record<'_>> {
        let exhausted = self
            .slice
            .as_ref()
            .map_or(true, |slice| self.slice_pos >= slice.len());
        if exhausted {
            self.slice = Some(self.index.slice(self.position, MAX_SLICE)?);
            self.slice_pos = 0;
        }

        let entry = self
            .slice
            .as_ref()
            .expect("slice refilled above")
            .get(self.slice_pos)?;

        let offset = u64::try_from(entry.offset).map_err(|_| LogError::ReadIndexRecord)?;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(LogError::read_log_record)?;
        self.file
            .read_exact(&mut self.buf[..RECORD_HEADER_SIZE])
            .map_err(LogError::read_log_record)?;

        let size = raw::read_u32(&self.buf, 0)? as usize;
        if size > self.max_record_size {
            return Err(LogError::InvalidRecordSize {
                size,
                limit: self.max_record_size,
            });
        }
        self.file
            .read_exact(&mut self.buf[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + size])
            .map_err(LogError::read_log_record)?;

        self.slice_pos += 1;
        self.position += 1;

        Ok(Record::decode(&self.buf[..RECORD_HEADER_SIZE + size])?)
    }

    /// The index of the record the next [`Cursor::next`] call returns.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Closes the cursor, dropping its read handle.
    pub fn close(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position)
            .field("max_record_size", &self.max_record_size)
            .finish_non_exhaustive()
    }
}

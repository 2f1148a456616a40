//! Byte store trait definition.

use crate::error::StoreResult;

/// A low-level append-only byte store.
///
/// Stores are opaque: they hold bytes and know nothing about headers,
/// records or index entries. The engine owns all format interpretation.
///
/// # Invariants
///
/// - `append` returns the offset the data landed at
/// - `read_at` returns exactly the bytes previously appended there
/// - after `sync` returns, all appended data survives process death
/// - implementations are `Send + Sync` so an engine and its cursors can
///   share one store
pub trait ByteStore: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StoreError::ReadPastEnd`] when the range is not
    /// fully inside the store, or with an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>>;

    /// Appends `data`, returning the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StoreResult<()>;

    /// Forces data and metadata to stable storage.
    fn sync(&mut self) -> StoreResult<()>;

    /// Discards all bytes past `new_size`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StoreError::TruncatePastEnd`] when `new_size`
    /// exceeds the current size.
    fn truncate(&mut self, new_size: u64) -> StoreResult<()>;

    /// Current size in bytes; the offset the next `append` writes at.
    fn size(&self) -> StoreResult<u64>;
}

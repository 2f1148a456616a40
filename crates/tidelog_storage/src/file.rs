//! File-backed byte store.

use crate::error::{StoreError, StoreResult};
use crate::store::ByteStore;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Options controlling how a [`FileStore`] is opened.
#[derive(Debug, Clone, Copy)]
pub struct OpenMode {
    /// Unix permission bits applied when the file is created. Ignored on
    /// non-unix platforms.
    pub mode: u32,
    /// When true and the file already exists, its length is reset to 0.
    pub truncate: bool,
}

impl Default for OpenMode {
    fn default() -> Self {
        Self {
            mode: 0o600,
            truncate: false,
        }
    }
}

/// A persistent byte store over a single file.
///
/// Reads are positional and do not disturb the append position; the size
/// is tracked in an atomic so concurrent readers never take the file lock
/// just to learn it.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: Mutex<File>,
    size: AtomicU64,
}

impl FileStore {
    /// Opens or creates a store at `path` with default options.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with(path, &OpenMode::default())
    }

    /// Opens or creates a store at `path`.
    pub fn open_with(path: &Path, mode: &OpenMode) -> StoreResult<Self> {
        let mut options = OpenOptions::new();
        options
            .read(true)
            .write(true)
            .create(true)
            .truncate(mode.truncate);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode.mode);
        }

        let file = options.open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: AtomicU64::new(size),
        })
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file's last modification time.
    pub fn modified_time(&self) -> StoreResult<SystemTime> {
        let file = self.file.lock();
        Ok(file.metadata()?.modified()?)
    }

    /// Takes an advisory exclusive lock on the file.
    ///
    /// Returns `false` when another process already holds the lock. The
    /// lock is released when the store is dropped.
    pub fn try_lock_exclusive(&self) -> StoreResult<bool> {
        let file = self.file.lock();
        match FileExt::try_lock_exclusive(&*file) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

impl ByteStore for FileStore {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let size = self.size.load(Ordering::Acquire);
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StoreError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StoreResult<u64> {
        let offset = self.size.load(Ordering::Acquire);
        if data.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.size.fetch_add(data.len() as u64, Ordering::Release);
        Ok(offset)
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        let file = self.file.lock();
        let size = self.size.load(Ordering::Acquire);
        if new_size > size {
            return Err(StoreError::TruncatePastEnd {
                requested: new_size,
                size,
            });
        }
        file.set_len(new_size)?;
        file.sync_all()?;
        self.size.store(new_size, Ordering::Release);
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.size.load(Ordering::Acquire))
    }
}

//! Test fixtures and log helpers.

use tempfile::TempDir;
use tidelog_core::{Config, Log, LogResult, SyncStrategy};
use std::path::PathBuf;

/// A log in a temporary directory, with helpers to close and reopen it
/// across simulated restarts.
pub struct TempLog {
    /// Path of the data file.
    pub path: PathBuf,
    log: Option<Log>,
    _dir: TempDir,
}

impl TempLog {
    /// Creates and opens a fresh log with the given config.
    pub fn create(config: Config) -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let path = dir.path().join("test.log");
        let log = Log::create(&path, config).expect("failed to create log");
        log.open().expect("failed to open log");
        Self {
            path,
            log: Some(log),
            _dir: dir,
        }
    }

    /// The live log.
    pub fn log(&self) -> &Log {
        self.log.as_ref().expect("log was shut down")
    }

    /// Closes the log cleanly and releases the file lock.
    pub fn shutdown(&mut self) -> LogResult<()> {
        if let Some(log) = self.log.take() {
            log.close()?;
        }
        Ok(())
    }

    /// Drops the log without closing it, simulating a crash. Buffered
    /// but unflushed bytes are lost, as after a real power cut.
    pub fn crash(&mut self) {
        drop(self.log.take());
    }

    /// Re-creates the log over the existing file pair and opens it.
    pub fn reopen(&mut self, config: Config) {
        self.crash();
        let log = Log::create(&self.path, config).expect("failed to reopen log");
        log.open().expect("failed to open reopened log");
        self.log = Some(log);
    }
}

/// A config with per-write syncing, the durable end of the dichotomy.
#[must_use]
pub fn sync_config() -> Config {
    Config::new().strategy(SyncStrategy::SyncOnWrite)
}

/// A config relying on the OS page cache until close.
#[must_use]
pub fn nosync_config() -> Config {
    Config::new().strategy(SyncStrategy::NoSyncOnWrite)
}

/// Runs `f` against a fresh open log and tears it down afterwards.
pub fn with_temp_log<F, R>(config: Config, f: F) -> R
where
    F: FnOnce(&Log) -> R,
{
    let mut temp = TempLog::create(config);
    let result = f(temp.log());
    temp.shutdown().expect("failed to close log");
    result
}

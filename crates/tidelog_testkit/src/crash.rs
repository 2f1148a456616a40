//! Crash-scenario helpers.
//!
//! These manipulate the raw files of a log pair to reproduce the states
//! a power cut can leave behind: garbage past the last record, a record
//! cut short, an index entry written for data that never made it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Path of the index file belonging to `data_path`.
#[must_use]
pub fn index_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_os_string();
    name.push(".idx");
    PathBuf::from(name)
}

/// Appends `bytes` of garbage to a file, as a torn write would.
pub fn append_garbage(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("failed to open file for garbage append");
    file.write_all(bytes).expect("failed to append garbage");
    file.sync_all().expect("failed to sync garbage");
}

/// Cuts `n` bytes off the end of a file, as an interrupted write would.
pub fn chop_tail(path: &Path, n: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("failed to open file for chop");
    let len = file.metadata().expect("failed to stat file").len();
    assert!(n <= len, "cannot chop {n} bytes off a {len}-byte file");
    file.set_len(len - n).expect("failed to truncate file");
    file.sync_all().expect("failed to sync truncation");
}

/// Current byte length of a file.
#[must_use]
pub fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).expect("failed to stat file").len()
}

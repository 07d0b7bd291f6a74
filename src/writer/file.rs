//! File Writer
//!
//! Writes each buffer at its logical address within a single file.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::SyncStrategy;
use crate::error::Result;

use super::Writer;

struct FileState {
    file: File,
    /// Writes since the last fsync
    unsynced: usize,
}

/// Positional writer over one file
pub struct FileWriter {
    path: PathBuf,
    sync_strategy: SyncStrategy,
    state: Mutex<FileState>,
}

impl FileWriter {
    /// Create (or truncate) the log file at `path`
    pub fn create(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            sync_strategy,
            state: Mutex::new(FileState { file, unsynced: 0 }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of writes not yet covered by an fsync
    pub fn unsynced_count(&self) -> usize {
        self.state.lock().unsynced
    }

    /// Force sync to disk
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.file.sync_data()?;
        state.unsynced = 0;
        Ok(())
    }

    fn should_sync(&self, unsynced: usize) -> bool {
        match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNWrites { count } => unsynced >= count,
            SyncStrategy::Never => false,
        }
    }
}

impl Writer for FileWriter {
    fn write(&self, buffer: &[u8], logical_address: u64, _hint: i32) -> io::Result<()> {
        let mut state = self.state.lock();
        state.file.seek(SeekFrom::Start(logical_address))?;
        state.file.write_all(buffer)?;
        state.unsynced += 1;

        if self.should_sync(state.unsynced) {
            state.file.sync_data()?;
            state.unsynced = 0;
        }
        Ok(())
    }
}

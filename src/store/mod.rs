//!
//! The log store: one append-only file per replica id inside a data
//! directory. A file's byte length is its current offset; no index
//! exists besides the directory listing. All mutation happens under an
//! exclusive hold of the advisory lock file, snapshots and streaming
//! reads under a shared hold.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::StoreError;
use crate::types::OffsetMap;

pub mod replay;

pub use replay::{RawRecord, Replay};

/// Scoped hold of the advisory lock. Released when dropped, on every
/// exit path.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(%err, "releasing advisory lock failed");
        }
    }
}

/// The advisory lock file every participating process agrees on. It
/// serializes replicas on the same host; across hosts the append-only
/// discipline and the gapless graft check stand in for it.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Shared hold, for offset snapshots and streaming reads.
    pub fn shared(&self) -> Result<LockGuard, StoreError> {
        let file = OpenOptions::new().read(true).open(&self.path)?;
        file.lock_shared()?;
        Ok(LockGuard { file })
    }

    /// Exclusive hold, for appends and grafts.
    pub fn exclusive(&self) -> Result<LockGuard, StoreError> {
        let file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        file.lock_exclusive()?;
        Ok(LockGuard { file })
    }
}

/// One data directory of per-replica log files.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn log_path(&self, app_id: &str) -> PathBuf {
        self.data_dir.join(app_id)
    }

    /// Snapshot of per-replica file sizes, read from directory entries.
    /// Callers hold at least the shared lock.
    pub fn offsets(&self) -> Result<OffsetMap, StoreError> {
        let mut offsets = OffsetMap::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let app_id = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            offsets.insert(app_id, entry.metadata()?.len());
        }
        Ok(offsets)
    }

    /// Writer for one replica's log, created on first append. Callers
    /// hold the exclusive lock for the writer's whole lifetime.
    pub fn append(&self, app_id: &str) -> Result<Appender, StoreError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(self.log_path(app_id))?;
        Ok(Appender { file })
    }

    /// Raw bytes of one replica's log from `start` to end-of-file.
    pub fn raw_range(&self, app_id: &str, start: u64) -> Result<Vec<u8>, StoreError> {
        let mut file = File::open(self.log_path(app_id))?;
        file.seek(SeekFrom::Start(start))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Write raw bytes at `start`: an append when `start` is the current
    /// size, an in-place write only for bytes the merge engine has
    /// proven identical to another replica's committed prefix.
    pub fn raw_write(&self, app_id: &str, start: u64, data: &[u8]) -> Result<(), StoreError> {
        let path = self.log_path(app_id);
        if start == 0 {
            let mut file = OpenOptions::new().append(true).create(true).open(path)?;
            file.write_all(data)?;
        } else {
            let mut file = OpenOptions::new().read(true).write(true).open(path)?;
            file.seek(SeekFrom::Start(start))?;
            file.write_all(data)?;
        }
        Ok(())
    }
}

/// Appends whole records to one replica's log. [`offset`](Self::offset)
/// is the position the next record lands at; callers bind it into the
/// record's authenticated data before writing.
#[derive(Debug)]
pub struct Appender {
    file: File,
}

impl Appender {
    pub fn offset(&mut self) -> Result<u64, StoreError> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Write one record, in full or not at all.
    pub fn write_record(&mut self, record: &str) -> Result<(), StoreError> {
        self.file.write_all(record.as_bytes())?;
        Ok(())
    }
}

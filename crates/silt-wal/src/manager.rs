//! Synchronous log manager.

use crate::record::{LogRecord, Lsn};
use parking_lot::Mutex;
use silt_common::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Configuration for the log manager.
#[derive(Debug, Clone)]
pub struct LogManagerConfig {
    /// Directory for the log file.
    pub wal_dir: PathBuf,
    /// Enable fsync on flush.
    pub fsync_enabled: bool,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::from("./data/wal"),
            fsync_enabled: true,
        }
    }
}

/// Append-only log over a single file.
///
/// Records are assigned monotonically increasing LSNs and staged in an
/// in-memory buffer; `flush` makes everything appended so far durable. The
/// buffer pool calls `flush` before writing a dirty page back to the data
/// file, which is the only durability ordering this system promises.
pub struct LogManager {
    /// Configuration.
    config: LogManagerConfig,
    /// The open log file.
    file: Mutex<File>,
    /// Records appended but not yet flushed.
    buffer: Mutex<Vec<u8>>,
    /// Next LSN to assign.
    next_lsn: AtomicU64,
    /// Highest LSN known durable.
    flushed_lsn: AtomicU64,
}

impl LogManager {
    /// Name of the log file inside `wal_dir`.
    const LOG_FILE: &'static str = "silt.wal";

    /// Creates a log manager, creating the directory and file as needed.
    pub fn new(config: LogManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.wal_dir)?;

        let path = config.wal_dir.join(Self::LOG_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            config,
            file: Mutex::new(file),
            buffer: Mutex::new(Vec::new()),
            next_lsn: AtomicU64::new(Lsn::FIRST.0),
            flushed_lsn: AtomicU64::new(Lsn::INVALID.0),
        })
    }

    /// Returns the directory containing the log file.
    pub fn wal_dir(&self) -> &Path {
        &self.config.wal_dir
    }

    /// Returns the next LSN that will be assigned.
    pub fn next_lsn(&self) -> Lsn {
        Lsn(self.next_lsn.load(Ordering::SeqCst))
    }

    /// Returns the highest LSN known durable.
    pub fn flushed_lsn(&self) -> Lsn {
        Lsn(self.flushed_lsn.load(Ordering::SeqCst))
    }

    /// Appends a record, assigning its LSN. The record is buffered until
    /// the next `flush`.
    pub fn append(&self, mut record: LogRecord) -> Result<Lsn> {
        let mut buffer = self.buffer.lock();
        // LSN assignment and buffer order must agree, so both happen under
        // the buffer latch.
        let lsn = Lsn(self.next_lsn.fetch_add(1, Ordering::SeqCst));
        record.lsn = lsn;
        buffer.extend_from_slice(&record.to_bytes());
        Ok(lsn)
    }

    /// Flushes all buffered records to the log file.
    pub fn flush(&self) -> Result<()> {
        let mut buffer = self.buffer.lock();
        if buffer.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock();
        file.write_all(&buffer)?;
        if self.config.fsync_enabled {
            file.sync_all()?;
        }
        buffer.clear();

        self.flushed_lsn
            .store(self.next_lsn.load(Ordering::SeqCst) - 1, Ordering::SeqCst);
        Ok(())
    }
}

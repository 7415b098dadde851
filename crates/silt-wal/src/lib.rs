//! Write-Ahead Log (WAL) for SiltDB.
//!
//! Provides the durability hook consumed by the buffer pool: records are
//! appended with monotonically increasing LSNs and flushed to disk before
//! dirty pages are written back. Log replay is out of scope.

pub mod manager;
pub mod record;

pub use manager::{LogManager, LogManagerConfig};
pub use record::{LogRecord, LogRecordType, Lsn};

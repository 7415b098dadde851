//! WAL log record format.

use bytes::{BufMut, Bytes, BytesMut};
use silt_common::page::PageId;

/// Log Sequence Number - unique identifier for each log record.
///
/// LSNs increase monotonically in append order; zero is reserved as the
/// invalid sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Lsn(pub u64);

impl Lsn {
    /// Invalid/uninitialized LSN.
    pub const INVALID: Lsn = Lsn(0);

    /// First valid LSN.
    pub const FIRST: Lsn = Lsn(1);

    /// Returns true if this is a valid LSN.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Lsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lsn:{}", self.0)
    }
}

/// Types of log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Invalid/padding record.
    Invalid = 0,
    /// Transaction begin.
    Begin = 1,
    /// Transaction commit.
    Commit = 2,
    /// Transaction abort/rollback.
    Abort = 3,
    /// A page is about to be written back to the data file.
    PageWrite = 10,
    /// Checkpoint begin marker.
    CheckpointBegin = 30,
    /// Checkpoint end marker.
    CheckpointEnd = 31,
}

impl LogRecordType {
    /// Decodes a record type from its on-disk tag.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => LogRecordType::Begin,
            2 => LogRecordType::Commit,
            3 => LogRecordType::Abort,
            10 => LogRecordType::PageWrite,
            30 => LogRecordType::CheckpointBegin,
            31 => LogRecordType::CheckpointEnd,
            _ => LogRecordType::Invalid,
        }
    }
}

/// A single WAL record.
///
/// Layout:
/// - total_len: 4 bytes (header + payload)
/// - lsn: 8 bytes
/// - record_type: 1 byte
/// - reserved: 3 bytes
/// - page_id: 4 bytes (INVALID when not page-related)
/// - payload_len: 4 bytes
/// - payload: variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Sequence number, assigned by the log manager on append.
    pub lsn: Lsn,
    /// Record kind.
    pub record_type: LogRecordType,
    /// Page this record concerns, if any.
    pub page_id: PageId,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl LogRecord {
    /// Size of the fixed record header in bytes.
    pub const HEADER_SIZE: usize = 24;

    /// Creates a record with an unassigned LSN.
    pub fn new(record_type: LogRecordType, page_id: PageId, payload: Bytes) -> Self {
        Self {
            lsn: Lsn::INVALID,
            record_type,
            page_id,
            payload,
        }
    }

    /// Total serialized size of this record.
    pub fn size_on_disk(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }

    /// Serializes the record.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size_on_disk());
        buf.put_u32_le(self.size_on_disk() as u32);
        buf.put_u64_le(self.lsn.0);
        buf.put_u8(self.record_type as u8);
        buf.put_bytes(0, 3);
        buf.put_u32_le(self.page_id.0);
        buf.put_u32_le(self.payload.len() as u32);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Deserializes a record. Returns (record, bytes consumed).
    pub fn from_bytes(buf: &[u8]) -> Option<(Self, usize)> {
        if buf.len() < Self::HEADER_SIZE {
            return None;
        }

        let total_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if total_len < Self::HEADER_SIZE || buf.len() < total_len {
            return None;
        }

        let lsn = Lsn(u64::from_le_bytes([
            buf[4], buf[5], buf[6], buf[7], buf[8], buf[9], buf[10], buf[11],
        ]));
        let record_type = LogRecordType::from_u8(buf[12]);
        let page_id = PageId(u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]));
        let payload_len = u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]) as usize;

        if Self::HEADER_SIZE + payload_len != total_len {
            return None;
        }

        let payload = Bytes::copy_from_slice(&buf[Self::HEADER_SIZE..total_len]);
        Some((
            Self {
                lsn,
                record_type,
                page_id,
                payload,
            },
            total_len,
        ))
    }
}

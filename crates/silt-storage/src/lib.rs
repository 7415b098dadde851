//! Storage engine for SiltDB.
//!
//! This crate provides:
//! - Disk manager for page-level file I/O over a single data file
//! - Record identifiers used as index values
//! - B+ tree index backed by the buffer pool, with named roots on the
//!   header page and a forward iterator over the leaf chain

mod btree;
mod disk;
mod rid;

pub use btree::{
    BPlusTree, BTreeInternalPage, BTreeLeafPage, BTreePageHeader, BytewiseComparator, HeaderPage,
    IndexKey, IndexPageType, Int64Comparator, KeyComparator, TreeIter, KEY_SIZE,
};
pub use disk::{DiskManagerConfig, FileDiskManager};
pub use rid::RecordId;

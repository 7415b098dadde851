//! Buffer pool management for SiltDB.
//!
//! This crate provides in-memory page caching with:
//! - Fixed-size buffer pool with configurable frame count
//! - LRU-K eviction policy
//! - Extendible hash table used as the page table (and as a standalone map)
//! - Pin counting for concurrent access
//! - Dirty page tracking with write-back through a disk manager

mod disk;
mod frame;
mod hash_table;
mod pool;
mod replacer;

pub use disk::DiskManager;
pub use frame::{BufferFrame, FrameId};
pub use hash_table::ExtendibleHashTable;
pub use pool::{BufferPool, BufferPoolConfig, BufferPoolStats, PageReadGuard, PageWriteGuard};
pub use replacer::{LruKReplacer, Replacer};

//! Disk manager contract consumed by the buffer pool.

use silt_common::page::{PageId, PAGE_SIZE};
use silt_common::Result;

/// Random-access page I/O by page identifier.
///
/// The buffer pool reads misses and writes dirty victims through this
/// trait; page ids come from `allocate_page` and return to the
/// implementation's free list via `deallocate_page`. Page 0 is reserved
/// for the header page and is expected to be the first id handed out.
pub trait DiskManager: Send + Sync {
    /// Reads a page into the provided buffer.
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Writes a page to stable storage.
    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Allocates a new page and returns its id.
    fn allocate_page(&self) -> Result<PageId>;

    /// Returns a page id to the free list.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

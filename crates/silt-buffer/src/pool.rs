//! Buffer pool manager.

use crate::disk::DiskManager;
use crate::frame::{BufferFrame, FrameId};
use crate::hash_table::ExtendibleHashTable;
use crate::replacer::{LruKReplacer, Replacer};
use parking_lot::Mutex;
use silt_common::page::{PageId, PAGE_SIZE};
use silt_common::{Result, SiltError};
use silt_wal::LogManager;
use std::collections::VecDeque;
use std::sync::Arc;
use sysinfo::System;

/// Entries per bucket in the page table.
const PAGE_TABLE_BUCKET_SIZE: usize = 8;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
    /// K for the LRU-K replacement policy.
    pub replacer_k: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            num_frames: 1024,
            replacer_k: 2,
        }
    }
}

/// Bookkeeping state behind the pool latch.
struct PoolState {
    /// Page id to frame id mapping.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// LRU-K eviction policy.
    replacer: LruKReplacer,
    /// Frames holding no page, in FIFO order.
    free_list: VecDeque<FrameId>,
}

/// Buffer pool manager.
///
/// Mediates between page ids and a fixed pool of in-memory frames:
/// - at most one frame holds any given page id
/// - pinned frames are never evicted
/// - dirty frames are written back before their frame is reused
///
/// Every operation holds the pool latch for its full duration, disk I/O
/// included; the single-latch bottleneck is intentional. The page table
/// and replacer are only consulted under that latch, giving the nesting
/// order pool -> (page table, replacer).
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames.
    frames: Vec<BufferFrame>,
    /// Page table, replacer, and free list.
    state: Mutex<PoolState>,
    /// Backing store for page reads and write-back.
    disk: Arc<dyn DiskManager>,
    /// Durability hook, flushed before any dirty page write.
    log: Option<Arc<LogManager>>,
}

impl BufferPool {
    /// Creates a new buffer pool over the given disk manager.
    pub fn new(
        config: BufferPoolConfig,
        disk: Arc<dyn DiskManager>,
        log: Option<Arc<LogManager>>,
    ) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start in the free list.
        let free_list: VecDeque<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
                replacer: LruKReplacer::new(num_frames, config.replacer_k),
                free_list,
            }),
            disk,
            log,
            config,
        }
    }

    /// Creates a buffer pool sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames so caching stays useful on small machines.
    pub fn auto_sized(disk: Arc<dyn DiskManager>, log: Option<Arc<LogManager>>) -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(
            BufferPoolConfig {
                num_frames,
                ..Default::default()
            },
            disk,
            log,
        )
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Returns the number of pages currently resident.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Checks if a page is resident in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains(&page_id)
    }

    /// Flushes the log manager, if one is attached.
    fn flush_log(&self) -> Result<()> {
        if let Some(log) = &self.log {
            log.flush()?;
        }
        Ok(())
    }

    /// Obtains a reusable frame: free list first, then eviction.
    ///
    /// A dirty victim is written back and its mapping removed before the
    /// frame is handed out, so the page table always reflects residency.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = state.replacer.evict() else {
            return Err(SiltError::BufferPoolFull);
        };

        let frame = &self.frames[frame_id.0 as usize];
        if let Some(old_page_id) = frame.page_id() {
            state.page_table.remove(&old_page_id);
            if frame.is_dirty() {
                self.flush_log()?;
                let data = frame.read_data();
                self.disk.write_page(old_page_id, &data)?;
                drop(data);
                frame.set_dirty(false);
            }
        }

        Ok(frame_id)
    }

    /// Registers a frame as the pinned holder of `page_id`.
    fn install_mapping(&self, state: &mut PoolState, page_id: PageId, frame_id: FrameId) {
        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);
    }

    /// Allocates a fresh page and returns its pinned, zeroed frame.
    ///
    /// Fails with `BufferPoolFull` when no frame is free and none is
    /// evictable; the caller must unpin something and retry.
    pub fn new_page(&self) -> Result<&BufferFrame> {
        let state = &mut *self.state.lock();

        let frame_id = self.acquire_frame(state)?;
        let page_id = match self.disk.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0 as usize];
        frame.reset();
        frame.set_page_id(Some(page_id));
        frame.pin();

        self.install_mapping(state, page_id, frame_id);
        Ok(frame)
    }

    /// Fetches a page, reading it from disk if not resident.
    ///
    /// The returned frame is pinned; every fetch must be paired with an
    /// `unpin_page`.
    pub fn fetch_page(&self, page_id: PageId) -> Result<&BufferFrame> {
        assert!(page_id.is_valid(), "fetch of the invalid page id");
        let state = &mut *self.state.lock();

        if let Some(frame_id) = state.page_table.find(&page_id) {
            let frame = &self.frames[frame_id.0 as usize];
            frame.pin();
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);
            return Ok(frame);
        }

        let frame_id = self.acquire_frame(state)?;
        let frame = &self.frames[frame_id.0 as usize];
        frame.reset();

        {
            let mut data = frame.write_data();
            if let Err(e) = self.disk.read_page(page_id, &mut data) {
                drop(data);
                state.free_list.push_back(frame_id);
                return Err(e);
            }
        }

        frame.set_page_id(Some(page_id));
        frame.pin();
        self.install_mapping(state, page_id, frame_id);
        Ok(frame)
    }

    /// Unpins a page, optionally marking it dirty.
    ///
    /// Returns false if the page is not resident or its pin count is
    /// already zero. The dirty flag is only ever raised here; flushing and
    /// frame reuse are what clear it.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = &mut *self.state.lock();

        let Some(frame_id) = state.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.0 as usize];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            state.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes a page to disk and clears its dirty flag.
    ///
    /// Succeeds even when the page is pinned. Returns Ok(false) if the
    /// page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let state = &mut *self.state.lock();

        let Some(frame_id) = state.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.0 as usize];

        self.flush_log()?;
        let data = frame.read_data();
        self.disk.write_page(page_id, &data)?;
        drop(data);
        frame.set_dirty(false);
        Ok(true)
    }

    /// Flushes every resident page. Returns the number of pages written.
    pub fn flush_all_pages(&self) -> Result<usize> {
        let state = &mut *self.state.lock();

        let mut resident = Vec::new();
        state
            .page_table
            .for_each(|page_id, frame_id| resident.push((*page_id, *frame_id)));

        self.flush_log()?;
        let mut flushed = 0;
        for (page_id, frame_id) in resident {
            let frame = &self.frames[frame_id.0 as usize];
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
            drop(data);
            frame.set_dirty(false);
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Deletes a page from the pool and deallocates its id.
    ///
    /// A non-resident page is vacuously deleted (Ok(true)); a pinned page
    /// cannot be deleted (Ok(false)). A dirty page is flushed first.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let state = &mut *self.state.lock();

        let Some(frame_id) = state.page_table.find(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.0 as usize];
        if frame.is_pinned() {
            return Ok(false);
        }

        if frame.is_dirty() {
            self.flush_log()?;
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
        }

        state.page_table.remove(&page_id);
        state.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id)?;
        Ok(true)
    }

    /// Returns a pinned read guard for a page.
    pub fn read_page(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard {
            pool: self,
            page_id,
            frame,
        })
    }

    /// Returns a pinned write guard for a page.
    pub fn write_page(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard {
            pool: self,
            page_id,
            frame,
        })
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let state = self.state.lock();

        let mut pinned_count = 0;
        let mut dirty_count = 0;
        state.page_table.for_each(|_, frame_id| {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_count += 1;
            }
            if frame.is_dirty() {
                dirty_count += 1;
            }
        });

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: state.free_list.len(),
            used_frames: state.page_table.len(),
            pinned_frames: pinned_count,
            dirty_frames: dirty_count,
        }
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames holding pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// RAII guard holding a pin for reading a page.
pub struct PageReadGuard<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    frame: &'a BufferFrame,
}

impl<'a> PageReadGuard<'a> {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page data.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, false);
    }
}

/// RAII guard holding a pin for writing a page.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    frame: &'a BufferFrame,
}

impl<'a> PageWriteGuard<'a> {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns mutable access to the page data.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.write_data()
    }

    /// Marks the page as dirty.
    pub fn set_dirty(&self) {
        self.frame.set_dirty(true);
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        // The dirty flag was raised through set_dirty, if at all; unpin
        // must not clear it.
        self.pool.unpin_page(self.page_id, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    /// In-memory disk manager for pool tests.
    struct MemoryDisk {
        pages: PlMutex<Vec<Option<Box<[u8; PAGE_SIZE]>>>>,
        free: PlMutex<Vec<PageId>>,
    }

    impl MemoryDisk {
        fn new() -> Self {
            Self {
                pages: PlMutex::new(Vec::new()),
                free: PlMutex::new(Vec::new()),
            }
        }
    }

    impl DiskManager for MemoryDisk {
        fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
            let pages = self.pages.lock();
            match pages.get(page_id.0 as usize) {
                Some(Some(data)) => {
                    buf.copy_from_slice(&**data);
                    Ok(())
                }
                _ => Err(SiltError::PageNotFound { page_id: page_id.0 }),
            }
        }

        fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
            let mut pages = self.pages.lock();
            match pages.get_mut(page_id.0 as usize) {
                Some(slot) => {
                    *slot = Some(Box::new(*data));
                    Ok(())
                }
                None => Err(SiltError::PageNotFound { page_id: page_id.0 }),
            }
        }

        fn allocate_page(&self) -> Result<PageId> {
            if let Some(page_id) = self.free.lock().pop() {
                self.pages.lock()[page_id.0 as usize] = Some(Box::new([0u8; PAGE_SIZE]));
                return Ok(page_id);
            }
            let mut pages = self.pages.lock();
            pages.push(Some(Box::new([0u8; PAGE_SIZE])));
            Ok(PageId((pages.len() - 1) as u32))
        }

        fn deallocate_page(&self, page_id: PageId) -> Result<()> {
            self.free.lock().push(page_id);
            Ok(())
        }
    }

    fn create_test_pool(num_frames: usize) -> BufferPool {
        BufferPool::new(
            BufferPoolConfig {
                num_frames,
                replacer_k: 2,
            },
            Arc::new(MemoryDisk::new()),
            None,
        )
    }

    #[test]
    fn test_buffer_pool_new() {
        let pool = create_test_pool(10);

        assert_eq!(pool.num_frames(), 10);
        assert_eq!(pool.free_count(), 10);
        assert_eq!(pool.page_count(), 0);
    }

    #[test]
    fn test_buffer_pool_new_page() {
        let pool = create_test_pool(10);

        let frame = pool.new_page().unwrap();
        let page_id = frame.page_id().unwrap();

        assert_eq!(page_id, PageId(0));
        assert!(frame.is_pinned());
        assert!(!frame.is_dirty());
        assert_eq!(pool.free_count(), 9);
        assert_eq!(pool.page_count(), 1);
        assert!(pool.contains(page_id));
    }

    #[test]
    fn test_buffer_pool_fetch_existing() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();
        pool.unpin_page(page_id, false);

        let frame = pool.fetch_page(page_id).unwrap();
        assert_eq!(frame.page_id(), Some(page_id));
        assert_eq!(frame.pin_count(), 1);
    }

    #[test]
    fn test_buffer_pool_fetch_unallocated_page_fails() {
        let pool = create_test_pool(10);
        assert!(pool.fetch_page(PageId(99)).is_err());
        // The failed fetch must not leak its frame.
        assert_eq!(pool.free_count(), 10);
    }

    #[test]
    fn test_buffer_pool_unpin() {
        let pool = create_test_pool(10);

        let frame = pool.new_page().unwrap();
        let page_id = frame.page_id().unwrap();
        assert!(frame.is_pinned());

        assert!(pool.unpin_page(page_id, false));
        assert!(!self::frame_for(&pool, page_id).is_pinned());

        // Second unpin at pin count zero fails.
        assert!(!pool.unpin_page(page_id, false));
    }

    fn frame_for(pool: &BufferPool, page_id: PageId) -> &BufferFrame {
        let frame = pool.fetch_page(page_id).unwrap();
        pool.unpin_page(page_id, false);
        frame
    }

    #[test]
    fn test_buffer_pool_unpin_unmapped_page() {
        let pool = create_test_pool(10);
        assert!(!pool.unpin_page(PageId(5), false));
    }

    #[test]
    fn test_buffer_pool_dirty_tracking() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();
        pool.unpin_page(page_id, true);

        let frame = pool.fetch_page(page_id).unwrap();
        assert!(frame.is_dirty());

        // Unpinning clean never clears the dirty flag.
        pool.unpin_page(page_id, false);
        assert!(frame.is_dirty());
    }

    #[test]
    fn test_buffer_pool_eviction_roundtrip() {
        let pool = create_test_pool(3);

        // Write a recognizable byte into page 0, then evict it.
        let first = {
            let frame = pool.new_page().unwrap();
            let page_id = frame.page_id().unwrap();
            frame.write_data()[0] = 0xAB;
            pool.unpin_page(page_id, true);
            page_id
        };

        for _ in 0..3 {
            let frame = pool.new_page().unwrap();
            let page_id = frame.page_id().unwrap();
            pool.unpin_page(page_id, false);
        }
        assert!(!pool.contains(first));

        // Fetching it again reads the flushed bytes back from disk.
        let frame = pool.fetch_page(first).unwrap();
        assert_eq!(frame.read_data()[0], 0xAB);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_buffer_pool_full_all_pinned() {
        let pool = create_test_pool(2);

        pool.new_page().unwrap();
        pool.new_page().unwrap();

        let result = pool.new_page();
        assert!(matches!(result, Err(SiltError::BufferPoolFull)));
    }

    #[test]
    fn test_buffer_pool_retry_after_unpin() {
        let pool = create_test_pool(2);

        let p0 = pool.new_page().unwrap().page_id().unwrap();
        pool.new_page().unwrap();
        assert!(pool.new_page().is_err());

        pool.unpin_page(p0, false);
        assert!(pool.new_page().is_ok());
        assert!(!pool.contains(p0));
    }

    #[test]
    fn test_buffer_pool_delete_page() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();
        pool.unpin_page(page_id, false);

        assert!(pool.contains(page_id));
        assert!(pool.delete_page(page_id).unwrap());
        assert!(!pool.contains(page_id));
        assert_eq!(pool.free_count(), 10);
    }

    #[test]
    fn test_buffer_pool_delete_pinned_page() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();

        assert!(!pool.delete_page(page_id).unwrap());
        assert!(pool.contains(page_id));
    }

    #[test]
    fn test_buffer_pool_delete_unmapped_is_vacuous() {
        let pool = create_test_pool(10);
        assert!(pool.delete_page(PageId(42)).unwrap());
    }

    #[test]
    fn test_buffer_pool_deleted_page_id_is_reused() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();
        pool.unpin_page(page_id, false);
        pool.delete_page(page_id).unwrap();

        // The disk manager free list hands the id back.
        let reused = pool.new_page().unwrap().page_id().unwrap();
        assert_eq!(reused, page_id);
    }

    #[test]
    fn test_buffer_pool_flush_page() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();
        pool.unpin_page(page_id, true);

        assert!(pool.flush_page(page_id).unwrap());

        let frame = pool.fetch_page(page_id).unwrap();
        assert!(!frame.is_dirty());
        pool.unpin_page(page_id, false);

        assert!(!pool.flush_page(PageId(99)).unwrap());
    }

    #[test]
    fn test_buffer_pool_flush_pinned_page() {
        let pool = create_test_pool(10);

        let frame = pool.new_page().unwrap();
        let page_id = frame.page_id().unwrap();
        frame.set_dirty(true);

        // Flushing does not require unpinning.
        assert!(pool.flush_page(page_id).unwrap());
        assert!(!frame.is_dirty());
        assert_eq!(frame.pin_count(), 1);
    }

    #[test]
    fn test_buffer_pool_flush_all() {
        let pool = create_test_pool(10);

        for _ in 0..5 {
            let page_id = pool.new_page().unwrap().page_id().unwrap();
            pool.unpin_page(page_id, true);
        }

        assert_eq!(pool.flush_all_pages().unwrap(), 5);
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_buffer_pool_free_plus_resident_is_constant() {
        let pool = create_test_pool(8);

        let mut pages = Vec::new();
        for _ in 0..5 {
            let page_id = pool.new_page().unwrap().page_id().unwrap();
            pages.push(page_id);
        }
        assert_eq!(pool.free_count() + pool.page_count(), 8);

        for &page_id in &pages[..3] {
            pool.unpin_page(page_id, false);
            pool.delete_page(page_id).unwrap();
        }
        assert_eq!(pool.free_count() + pool.page_count(), 8);
    }

    #[test]
    fn test_buffer_pool_read_guard() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();
        pool.unpin_page(page_id, false);

        {
            let guard = pool.read_page(page_id).unwrap();
            assert_eq!(guard.page_id(), page_id);
        }

        // Guard dropped its pin; a fresh fetch holds the only pin.
        let frame = pool.fetch_page(page_id).unwrap();
        assert_eq!(frame.pin_count(), 1);
    }

    #[test]
    fn test_buffer_pool_write_guard() {
        let pool = create_test_pool(10);

        let page_id = pool.new_page().unwrap().page_id().unwrap();
        pool.unpin_page(page_id, false);

        {
            let guard = pool.write_page(page_id).unwrap();
            guard.set_dirty();
            guard.data_mut()[0] = 0xFF;
        }

        let frame = pool.fetch_page(page_id).unwrap();
        assert!(frame.is_dirty());
        assert_eq!(frame.read_data()[0], 0xFF);
    }

    #[test]
    fn test_buffer_pool_stats() {
        let pool = create_test_pool(10);

        for i in 0..5 {
            let frame = pool.new_page().unwrap();
            let page_id = frame.page_id().unwrap();
            if i % 2 == 0 {
                pool.unpin_page(page_id, true);
            }
            // Odd pages remain pinned.
        }

        let stats = pool.stats();
        assert_eq!(stats.total_frames, 10);
        assert_eq!(stats.free_frames, 5);
        assert_eq!(stats.used_frames, 5);
        assert_eq!(stats.pinned_frames, 2);
        assert_eq!(stats.dirty_frames, 3);
    }

    #[test]
    fn test_buffer_pool_concurrent_new_fetch_unpin() {
        let pool = Arc::new(create_test_pool(64));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            handles.push(std::thread::spawn(move || {
                for _ in 0..20 {
                    let frame = pool.new_page().unwrap();
                    let page_id = frame.page_id().unwrap();
                    frame.write_data()[0] = page_id.0 as u8;
                    pool.unpin_page(page_id, true);

                    let frame = pool.fetch_page(page_id).unwrap();
                    assert_eq!(frame.read_data()[0], page_id.0 as u8);
                    pool.unpin_page(page_id, false);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.page_count(), 64 - pool.free_count());
    }
}

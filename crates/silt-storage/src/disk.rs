//! Disk manager for page-level file I/O.

use parking_lot::Mutex;
use silt_buffer::DiskManager;
use silt_common::page::{PageId, PAGE_SIZE};
use silt_common::{Result, SiltError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Base directory for the data file.
    pub data_dir: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

/// State behind the disk manager latch.
struct DiskInner {
    /// The open data file.
    file: File,
    /// Number of pages the file currently holds.
    num_pages: u32,
    /// Deallocated page ids available for reuse.
    free_pages: Vec<PageId>,
}

/// Manages reading and writing pages of a single data file.
///
/// `allocate_page` hands out page 0 first, which callers reserve for the
/// header page. Deallocated ids go on an in-memory free list and are
/// reused before the file is extended; the file itself never shrinks.
pub struct FileDiskManager {
    /// Configuration.
    config: DiskManagerConfig,
    /// File handle, length, and free list.
    inner: Mutex<DiskInner>,
}

impl FileDiskManager {
    /// Name of the data file inside `data_dir`.
    const DATA_FILE: &'static str = "silt.db";

    /// Creates a disk manager, creating the directory and file as needed.
    pub fn new(config: DiskManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let path = config.data_dir.join(Self::DATA_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            config,
            inner: Mutex::new(DiskInner {
                file,
                num_pages,
                free_pages: Vec::new(),
            }),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Returns the number of pages in the data file.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.num_pages {
            return Err(SiltError::PageNotFound { page_id: page_id.0 });
        }

        inner.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        inner.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.num_pages {
            return Err(SiltError::PageNotFound { page_id: page_id.0 });
        }

        inner.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        inner.file.write_all(data)?;

        if self.config.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();

        // Reuse a deallocated page before extending the file, zeroing it
        // so stale contents never leak into a fresh page.
        let page_id = match inner.free_pages.pop() {
            Some(page_id) => page_id,
            None => {
                let page_id = PageId(inner.num_pages);
                inner.num_pages += 1;
                page_id
            }
        };

        inner.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        inner.file.write_all(&[0u8; PAGE_SIZE])?;

        if self.config.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(page_id)
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.num_pages {
            return Err(SiltError::PageNotFound { page_id: page_id.0 });
        }

        inner.free_pages.push(page_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_disk_manager() -> (FileDiskManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = DiskManagerConfig {
            data_dir: dir.path().to_path_buf(),
            fsync_enabled: false,
        };
        let dm = FileDiskManager::new(config).unwrap();
        (dm, dir)
    }

    #[test]
    fn test_disk_manager_new() {
        let (dm, _dir) = create_test_disk_manager();
        assert!(dm.data_dir().exists());
        assert_eq!(dm.num_pages(), 0);
    }

    #[test]
    fn test_disk_manager_allocates_header_page_first() {
        let (dm, _dir) = create_test_disk_manager();

        assert_eq!(dm.allocate_page().unwrap(), PageId::HEADER);
        assert_eq!(dm.allocate_page().unwrap(), PageId(1));
        assert_eq!(dm.num_pages(), 2);
    }

    #[test]
    fn test_disk_manager_write_read() {
        let (dm, _dir) = create_test_disk_manager();

        let page_id = dm.allocate_page().unwrap();

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAB;
        data[100] = 0xCD;
        data[PAGE_SIZE - 1] = 0xEF;
        dm.write_page(page_id, &data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();
        assert_eq!(read_data[0], 0xAB);
        assert_eq!(read_data[100], 0xCD);
        assert_eq!(read_data[PAGE_SIZE - 1], 0xEF);
    }

    #[test]
    fn test_disk_manager_read_unallocated_page() {
        let (dm, _dir) = create_test_disk_manager();

        dm.allocate_page().unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        assert!(dm.read_page(PageId(99), &mut buf).is_err());
    }

    #[test]
    fn test_disk_manager_write_unallocated_page() {
        let (dm, _dir) = create_test_disk_manager();
        assert!(dm.write_page(PageId(3), &[0u8; PAGE_SIZE]).is_err());
    }

    #[test]
    fn test_disk_manager_overwrite_page() {
        let (dm, _dir) = create_test_disk_manager();

        let page_id = dm.allocate_page().unwrap();

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAA;
        dm.write_page(page_id, &data).unwrap();

        data[0] = 0xBB;
        dm.write_page(page_id, &data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();
        assert_eq!(read_data[0], 0xBB);
    }

    #[test]
    fn test_disk_manager_deallocate_and_reuse() {
        let (dm, _dir) = create_test_disk_manager();

        let p0 = dm.allocate_page().unwrap();
        let p1 = dm.allocate_page().unwrap();

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0x77;
        dm.write_page(p1, &data).unwrap();

        dm.deallocate_page(p1).unwrap();
        let reused = dm.allocate_page().unwrap();
        assert_eq!(reused, p1);
        assert_ne!(reused, p0);

        // The reused page comes back zeroed.
        let mut read_data = [0xFFu8; PAGE_SIZE];
        dm.read_page(reused, &mut read_data).unwrap();
        assert_eq!(read_data[0], 0);
    }

    #[test]
    fn test_disk_manager_deallocate_unallocated_page() {
        let (dm, _dir) = create_test_disk_manager();
        assert!(dm.deallocate_page(PageId(5)).is_err());
    }

    #[test]
    fn test_disk_manager_persistence() {
        let dir = tempdir().unwrap();
        let page_id;

        {
            let config = DiskManagerConfig {
                data_dir: dir.path().to_path_buf(),
                fsync_enabled: true,
            };
            let dm = FileDiskManager::new(config).unwrap();
            page_id = dm.allocate_page().unwrap();

            let mut data = [0u8; PAGE_SIZE];
            data[0] = 0xFF;
            dm.write_page(page_id, &data).unwrap();
        }

        {
            let config = DiskManagerConfig {
                data_dir: dir.path().to_path_buf(),
                fsync_enabled: true,
            };
            let dm = FileDiskManager::new(config).unwrap();
            assert_eq!(dm.num_pages(), 1);

            let mut read_data = [0u8; PAGE_SIZE];
            dm.read_page(page_id, &mut read_data).unwrap();
            assert_eq!(read_data[0], 0xFF);
        }
    }

    #[test]
    fn test_disk_manager_flush() {
        let (dm, _dir) = create_test_disk_manager();
        dm.allocate_page().unwrap();
        dm.flush().unwrap();
    }
}

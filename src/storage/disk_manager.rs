//! Disk Manager - fixed-slot file I/O for index pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages at `page_id * page_size`
//! - Growing the file lazily as higher pages are written
//! - Syncing the file on flush

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::trace;

use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single index file.
///
/// # File Layout
/// ```text
/// ┌──────────┬──────────┬──────────┬─────────┬──────────┐
/// │ Page 0   │ Page 1   │ Page 2   │  ...    │ Page N   │
/// │ metadata │ schema   │ root     │         │          │
/// └──────────┴──────────┴──────────┴─────────┴──────────┘
/// Offset:  0   page_size  2×page_size  ...   N×page_size
/// ```
///
/// Every read and write computes its offset from the page id; nothing relies
/// on the file cursor left behind by a previous call.
///
/// # Lazily growing files
/// Reading a page past the end of the file returns a zeroed page instead of
/// an error, and writing one extends the file. A zeroed page decodes as
/// "no record", which is how the tree recognises a fresh file.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` serializes
/// access to it.
pub struct DiskManager {
    file: File,
    page_size: usize,
    /// Number of whole or partial slots present in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new index file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_size,
            page_count: 0,
        })
    }

    /// Open an existing index file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_size = file.metadata()?.len();
        let page_count = file_size.div_ceil(page_size as u64) as u32;

        Ok(Self {
            file,
            page_size,
            page_count,
        })
    }

    /// Open an existing index file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, page_size)
        } else {
            Self::create(path, page_size)
        }
    }

    /// Read a page from disk.
    ///
    /// Bytes past the end of the file read as zero, so a page that was never
    /// written comes back zeroed rather than as an error.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        let mut page = Page::new(self.page_size);
        if page_id.0 >= self.page_count {
            trace!(%page_id, "read past end of file, returning empty page");
            return Ok(page);
        }

        self.file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;

        // The last slot may be short if the file was truncated by hand.
        let buf = page.as_mut_slice();
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(page)
    }

    /// Write a page to disk at `page_id * page_size`.
    ///
    /// Writing past the current end extends the file; any gap reads back as
    /// zeros.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        debug_assert_eq!(page.size(), self.page_size, "page size mismatch");

        self.file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        self.file.write_all(page.as_slice())?;

        if page_id.0 >= self.page_count {
            self.page_count = page_id.0 + 1;
        }
        Ok(())
    }

    /// Flush OS buffers for the file to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Size of every slot in bytes.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of slots in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the file in bytes, as slots.
    #[inline]
    pub fn file_size(&self) -> u64 {
        u64::from(self.page_count) * self.page_size as u64
    }
}

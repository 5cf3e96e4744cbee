//! Record-level access to pinned pages.
//!
//! Callers never see a raw [`Page`]. A guard pins the page's frame for its
//! lifetime and exposes the page as one padded text record, so the
//! padding and terminator rules are applied in one place:
//! - [`PageReadGuard`] reads the record and unpins clean
//! - [`PageWriteGuard`] can replace the record; if it did, the frame is
//!   unpinned dirty

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::buffer_pool_manager::BufferPoolManager;
use crate::common::{FrameId, PageId, Result};
use crate::storage::page::Page;

/// Pin held by a guard. Releasing it hands the dirty flag to the pool.
struct Pin<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
}

impl Pin<'_> {
    fn release(&self, dirty: bool) {
        self.bpm.unpin_page_internal(self.frame_id, dirty);
    }
}

/// Shared access to a resident page.
///
/// ```ignore
/// let guard = bpm.fetch_page_read(page_id)?;
/// let node = codec::decode_node(guard.record()?)?;
/// ```
pub struct PageReadGuard<'a> {
    pin: Pin<'a>,
    page: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        page: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            pin: Pin {
                bpm,
                frame_id,
                page_id,
            },
            page,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    /// The stored record without padding. A page that was never written
    /// reads as `""`.
    pub fn record(&self) -> Result<&str> {
        self.page.record()
    }

    /// Raw slot bytes, padding and terminator included.
    pub fn bytes(&self) -> &[u8] {
        self.page.as_slice()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pin.release(false);
    }
}

/// Exclusive access to a resident page.
///
/// The frame is marked dirty on drop once [`set_record`](Self::set_record)
/// has succeeded, so a staged record is written back on eviction or flush
/// without a separate [`BufferPoolManager::mark_dirty`] call. A guard that
/// only read, or whose write overflowed, leaves the dirty bit alone.
///
/// ```ignore
/// let mut guard = bpm.fetch_page_write(node.id)?;
/// guard.set_record(&codec::encode_node(&node))?;
/// ```
pub struct PageWriteGuard<'a> {
    pin: Pin<'a>,
    page: RwLockWriteGuard<'a, Page>,
    staged: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        page: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            pin: Pin {
                bpm,
                frame_id,
                page_id,
            },
            page,
            staged: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    pub fn record(&self) -> Result<&str> {
        self.page.record()
    }

    /// Replace the page's record.
    ///
    /// # Errors
    /// `Error::PageOverflow` naming this page if `record` does not fit; the
    /// page keeps its previous content.
    pub fn set_record(&mut self, record: &str) -> Result<()> {
        self.page.set_record(self.pin.page_id, record)?;
        self.staged = true;
        Ok(())
    }

    /// Whether this guard has changed the page.
    pub fn is_staged(&self) -> bool {
        self.staged
    }

    pub fn bytes(&self) -> &[u8] {
        self.page.as_slice()
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pin.release(self.staged);
    }
}

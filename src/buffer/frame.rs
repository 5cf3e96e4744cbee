//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] pairs a [`Page`] buffer with the bookkeeping the pool needs
//! to decide whether the slot may be reused and whether it must be written
//! back first.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// Bookkeeping for one frame, updated as a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameState {
    /// Page currently held, or `None` for a free frame.
    pub page_id: Option<PageId>,
    /// Outstanding guards on this frame.
    pub pin_count: u32,
    /// Content differs from the backing file.
    pub dirty: bool,
}

/// A frame in the buffer pool.
///
/// The page bytes sit behind an `RwLock` so guards can borrow them; the
/// small state record sits behind a `Mutex` so pin count, dirty bit and page
/// id always change together.
pub struct Frame {
    page: RwLock<Page>,
    state: Mutex<FrameState>,
}

impl Frame {
    /// Create a new empty frame holding a zeroed `page_size` buffer.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: RwLock::new(Page::new(page_size)),
            state: Mutex::new(FrameState::default()),
        }
    }

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Copy of the current bookkeeping.
    #[inline]
    pub fn state(&self) -> FrameState {
        *self.state.lock()
    }

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        self.state.lock().page_id
    }

    /// Bind the frame to a freshly loaded page: clean, pinned once.
    pub fn load(&self, page_id: PageId) {
        *self.state.lock() = FrameState {
            page_id: Some(page_id),
            pin_count: 1,
            dirty: false,
        };
    }

    /// Increment the pin count. Returns the new pin count.
    pub fn pin(&self) -> u32 {
        let mut state = self.state.lock();
        state.pin_count += 1;
        state.pin_count
    }

    /// Decrement the pin count, optionally marking the frame dirty.
    /// Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    pub fn unpin(&self, dirty: bool) -> u32 {
        let mut state = self.state.lock();
        assert!(state.pin_count > 0, "pin count underflow");
        state.pin_count -= 1;
        state.dirty |= dirty;
        state.pin_count
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.state.lock().pin_count
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.state.lock().dirty = true;
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.state.lock().dirty = false;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Drop the page binding. The buffer keeps its stale bytes until the
    /// next load overwrites them.
    pub fn release(&self) {
        *self.state.lock() = FrameState::default();
    }
}

//! Buffer Pool Manager - the page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between the index file and memory
//! - Pin-based reference counting through RAII guards
//! - Write-back of dirty pages on eviction and flush
//! - A cache policy chosen at construction (LRU or direct-mapped)

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::buffer::replacer::{self, Replacer};
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::config::CachePolicy;
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Manages a pool of frames caching pages of one index file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ LRU | Direct │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Write-back guarantee
/// A dirty frame is only ever reused after its page has been written to
/// the file. If that write fails the frame stays resident and dirty and the
/// fetch that needed it returns the error.
///
/// # Locking
/// A guard holds its frame's page lock. Flushing a page while holding a
/// write guard on the same page deadlocks, so drop guards before flushing.
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps resident page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Frames holding no page (LIFO).
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<Box<dyn Replacer>>,

    /// Handles all file I/O.
    disk_manager: Mutex<DiskManager>,

    stats: BufferPoolStats,

    policy: CachePolicy,
}

impl BufferPoolManager {
    /// Create a buffer pool over `disk_manager` using `policy`.
    ///
    /// Frames are sized to the disk manager's page size.
    ///
    /// # Panics
    /// Panics if the policy asks for zero frames.
    pub fn new(policy: CachePolicy, disk_manager: DiskManager) -> Self {
        let pool_size = policy.pool_size();
        assert!(pool_size > 0, "pool_size must be > 0");

        let page_size = disk_manager.page_size();
        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new(page_size)).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();
        let replacer = replacer::for_policy(policy);
        debug!(policy = replacer.name(), pool_size, page_size, "created buffer pool");

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(replacer),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            policy,
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading.
    ///
    /// Loads the page from the file on a miss, evicting (and writing back)
    /// another page if the pool is full. A page past the end of the file
    /// comes back zeroed.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - I/O errors from the read or from writing back the victim
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing.
    ///
    /// Same as `fetch_page_read`, but the guard can replace the record. The
    /// frame is marked dirty when a guard that did so drops.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Flag a resident page as modified and promote its recency.
    ///
    /// Returns `false` if the page is not resident.
    pub fn mark_dirty(&self, page_id: PageId) -> bool {
        let Some(frame_id) = self.lookup(page_id) else {
            return false;
        };

        self.frames[frame_id.0].mark_dirty();
        self.replacer.lock().record_access(frame_id);
        trace!(%page_id, "marked dirty");
        true
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a page back if it is resident and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        match self.lookup(page_id) {
            Some(frame_id) => self.flush_frame(frame_id, page_id),
            None => Ok(()),
        }
    }

    /// Write back every dirty page and sync the file.
    ///
    /// Dirty bits are cleared, so calling this twice in a row writes
    /// nothing the second time.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };
        pages.sort_unstable_by_key(|&(pid, _)| pid);

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Size in bytes of every page in this pool.
    pub fn page_size(&self) -> usize {
        self.disk_manager.lock().page_size()
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Resident frames that are unpinned and could be evicted.
    pub fn evictable_count(&self) -> usize {
        self.replacer.lock().size()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Whether `page_id` currently occupies a frame.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.lookup(page_id).is_some()
    }

    /// Dirty bit of a resident page, `None` if not resident.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        self.lookup(page_id)
            .map(|frame_id| self.frames[frame_id.0].is_dirty())
    }

    /// Pin count of a resident page, `None` if not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.lookup(page_id)
            .map(|frame_id| self.frames[frame_id.0].pin_count())
    }

    // ========================================================================
    // Internal: Called by page guards on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let remaining = self.frames[frame_id.0].unpin(is_dirty);
        if remaining == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn lookup(&self, page_id: PageId) -> Option<FrameId> {
        self.page_table.read().get(&page_id).copied()
    }

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        let resident = {
            let page_table = self.page_table.read();
            let frame_id = page_table.get(&page_id).copied();
            // Pinned under the table lock; eviction rechecks the pin under
            // the write lock before it unmaps a page.
            if let Some(frame_id) = frame_id {
                self.frames[frame_id.0].pin();
            }
            frame_id
        };

        match resident {
            Some(frame_id) => {
                self.record_pinned(frame_id);
                BufferPoolStats::bump(&self.stats.cache_hits);
                trace!(%page_id, "buffer hit");
                Ok(frame_id)
            }
            None => self.handle_cache_miss(page_id),
        }
    }

    fn record_pinned(&self, frame_id: FrameId) {
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        BufferPoolStats::bump(&self.stats.cache_misses);

        let frame_id = self.get_free_frame()?;

        let loaded = self.disk_manager.lock().read_page(page_id);
        let page = match loaded {
            Ok(page) => page,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_read);

        let frame = &self.frames[frame_id.0];
        frame.page_mut().as_mut_slice().copy_from_slice(page.as_slice());

        let mut page_table = self.page_table.write();
        if let Some(&resident) = page_table.get(&page_id) {
            // Another caller loaded the same page meanwhile; use its frame.
            self.frames[resident.0].pin();
            drop(page_table);
            self.free_list.lock().push(frame_id);
            self.record_pinned(resident);
            trace!(%page_id, frame = %resident, "page loaded concurrently");
            return Ok(resident);
        }
        frame.load(page_id);
        page_table.insert(page_id, frame_id);
        drop(page_table);

        self.record_pinned(frame_id);
        trace!(%page_id, frame = %frame_id, "buffer miss, page loaded");
        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    /// Take a frame from the replacer and unmap its page, writing it back
    /// first if dirty.
    ///
    /// A candidate that was pinned again after the replacer chose it is
    /// handed back and another one is tried.
    fn evict_page(&self) -> Result<FrameId> {
        for _ in 0..=self.frames.len() {
            let frame_id = self
                .replacer
                .lock()
                .evict()
                .ok_or(Error::NoFreeFrames)?;
            let frame = &self.frames[frame_id.0];

            let mut page_table = self.page_table.write();
            let state = frame.state();
            if state.pin_count > 0 {
                drop(page_table);
                self.return_to_replacer(frame_id);
                continue;
            }

            if let Some(victim) = state.page_id {
                if state.dirty {
                    if let Err(e) = self.flush_frame(frame_id, victim) {
                        // Keep the unwritten page resident rather than lose it.
                        drop(page_table);
                        self.return_to_replacer(frame_id);
                        return Err(e);
                    }
                    BufferPoolStats::bump(&self.stats.dirty_evictions);
                }

                if page_table.get(&victim) == Some(&frame_id) {
                    page_table.remove(&victim);
                }
                debug!(page_id = %victim, frame = %frame_id, dirty = state.dirty, "evicted page");
            }

            frame.release();
            drop(page_table);
            BufferPoolStats::bump(&self.stats.evictions);
            return Ok(frame_id);
        }
        Err(Error::NoFreeFrames)
    }

    /// Give the replacer back a frame it handed out but that was not
    /// evicted. It is evictable again only if no guard holds it.
    fn return_to_replacer(&self, frame_id: FrameId) {
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, !self.frames[frame_id.0].is_pinned());
    }

    /// Write a frame back if dirty.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        if !frame.is_dirty() || frame.page_id() != Some(page_id) {
            return Ok(());
        }

        {
            let page = frame.page();
            self.disk_manager.lock().write_page(page_id, &page)?;
        }

        frame.clear_dirty();
        BufferPoolStats::bump(&self.stats.pages_written);
        debug!(%page_id, "wrote back page");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: usize = 61;

    fn create_test_bpm(policy: CachePolicy) -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("index.txt"), PAGE).unwrap();
        (BufferPoolManager::new(policy, dm), dir)
    }

    fn lru(capacity: usize) -> CachePolicy {
        CachePolicy::Lru { capacity }
    }

    fn write(bpm: &BufferPoolManager, page_id: u32, record: &str) {
        let pid = PageId::new(page_id);
        let mut guard = bpm.fetch_page_write(pid).unwrap();
        guard.set_record(record).unwrap();
    }

    fn read(bpm: &BufferPoolManager, page_id: u32) -> String {
        let guard = bpm.fetch_page_read(PageId::new(page_id)).unwrap();
        let record = guard.record().unwrap().to_string();
        record
    }

    #[test]
    fn test_fetch_unwritten_page_is_empty() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        assert_eq!(read(&bpm, 7), "");
        assert!(bpm.contains(PageId::new(7)));
    }

    #[test]
    fn test_write_then_read() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        write(&bpm, 2, "2;1;;null;null;null;null;");
        assert_eq!(read(&bpm, 2), "2;1;;null;null;null;null;");
        assert_eq!(bpm.is_dirty(PageId::new(2)), Some(true));
    }

    #[test]
    fn test_cache_hit_counts() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        read(&bpm, 0);
        read(&bpm, 0);
        read(&bpm, 0);

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hits, 2);
    }

    #[test]
    fn test_clean_eviction_writes_nothing() {
        let (bpm, _dir) = create_test_bpm(lru(2));
        for pid in 1..=3 {
            read(&bpm, pid);
        }

        assert!(!bpm.contains(PageId::new(1)));
        assert!(bpm.contains(PageId::new(2)));
        assert!(bpm.contains(PageId::new(3)));

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.dirty_evictions, 0);
        assert_eq!(snapshot.pages_written, 0);
    }

    #[test]
    fn test_lru_hit_protects_page() {
        let (bpm, _dir) = create_test_bpm(lru(2));
        read(&bpm, 1);
        read(&bpm, 2);
        read(&bpm, 1);
        read(&bpm, 3);

        assert!(bpm.contains(PageId::new(1)));
        assert!(!bpm.contains(PageId::new(2)));
    }

    #[test]
    fn test_mark_dirty_promotes() {
        let (bpm, _dir) = create_test_bpm(lru(2));
        read(&bpm, 1);
        read(&bpm, 2);
        assert!(bpm.mark_dirty(PageId::new(1)));
        read(&bpm, 3);

        assert!(bpm.contains(PageId::new(1)));
        assert!(!bpm.contains(PageId::new(2)));
        assert!(!bpm.mark_dirty(PageId::new(2)));
    }

    #[test]
    fn test_dirty_page_written_back_on_eviction() {
        let (bpm, _dir) = create_test_bpm(lru(1));
        write(&bpm, 0, "nextId:3;rootId:2;height:1");
        read(&bpm, 1);

        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.dirty_evictions, 1);
        assert_eq!(snapshot.pages_written, 1);
        assert_eq!(read(&bpm, 0), "nextId:3;rootId:2;height:1");
    }

    #[test]
    fn test_direct_policy_replaces_held_frame() {
        let (bpm, _dir) = create_test_bpm(CachePolicy::Direct);
        assert_eq!(bpm.pool_size(), 1);

        write(&bpm, 2, "two");
        write(&bpm, 3, "three");
        assert!(!bpm.contains(PageId::new(2)));
        assert_eq!(bpm.page_count(), 1);

        assert_eq!(read(&bpm, 2), "two");
        assert_eq!(read(&bpm, 3), "three");
    }

    #[test]
    fn test_flush_is_idempotent() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        write(&bpm, 0, "a");
        write(&bpm, 1, "b");

        bpm.flush_all_pages().unwrap();
        let after_first = bpm.stats().snapshot().pages_written;
        assert_eq!(after_first, 2);

        bpm.flush_all_pages().unwrap();
        assert_eq!(bpm.stats().snapshot().pages_written, after_first);
        assert_eq!(bpm.is_dirty(PageId::new(0)), Some(false));
    }

    #[test]
    fn test_flush_single_page() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        write(&bpm, 0, "a");
        write(&bpm, 1, "b");

        bpm.flush_page(PageId::new(1)).unwrap();
        assert_eq!(bpm.is_dirty(PageId::new(0)), Some(true));
        assert_eq!(bpm.is_dirty(PageId::new(1)), Some(false));

        // Not resident: nothing to do.
        bpm.flush_page(PageId::new(9)).unwrap();
    }

    #[test]
    fn test_no_free_frames() {
        let (bpm, _dir) = create_test_bpm(lru(2));
        let _g1 = bpm.fetch_page_read(PageId::new(0)).unwrap();
        let _g2 = bpm.fetch_page_read(PageId::new(1)).unwrap();

        let result = bpm.fetch_page_read(PageId::new(2));
        assert!(matches!(result, Err(Error::NoFreeFrames)));
    }

    #[test]
    fn test_pin_count_tracking() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        let pid = PageId::new(0);

        let g1 = bpm.fetch_page_read(pid).unwrap();
        let g2 = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(bpm.pin_count(pid), Some(2));
        assert_eq!(bpm.evictable_count(), 0);

        drop(g1);
        assert_eq!(bpm.pin_count(pid), Some(1));
        drop(g2);
        assert_eq!(bpm.pin_count(pid), Some(0));
        assert_eq!(bpm.evictable_count(), 1);
        assert_eq!(bpm.pin_count(PageId::new(5)), None);
    }

    #[test]
    fn test_read_guard_does_not_dirty() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        read(&bpm, 3);
        assert_eq!(bpm.is_dirty(PageId::new(3)), Some(false));
    }

    #[test]
    fn test_unstaged_write_guard_stays_clean() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        {
            let guard = bpm.fetch_page_write(PageId::new(4)).unwrap();
            assert!(!guard.is_staged());
            assert_eq!(guard.record().unwrap(), "");
            assert!(guard.bytes().iter().all(|&b| b == 0));
        }
        assert_eq!(bpm.is_dirty(PageId::new(4)), Some(false));
    }

    #[test]
    fn test_overflowing_record_leaves_page_clean() {
        let (bpm, _dir) = create_test_bpm(lru(4));
        let pid = PageId::new(2);
        {
            let mut guard = bpm.fetch_page_write(pid).unwrap();
            let result = guard.set_record(&"9".repeat(PAGE));
            assert!(matches!(
                result,
                Err(Error::PageOverflow { page_id, .. }) if page_id == pid
            ));
            assert!(!guard.is_staged());
        }
        assert_eq!(bpm.is_dirty(pid), Some(false));

        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.bytes().len(), PAGE);
        assert_eq!(guard.record().unwrap(), "");
    }

    /// `/dev/full` accepts the open and every read but fails every write,
    /// so the victim's write-back is guaranteed to fail.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_back_keeps_page_resident() {
        let path = std::path::Path::new("/dev/full");
        if !path.exists() {
            return;
        }
        let dm = DiskManager::open(path, PAGE).unwrap();
        let bpm = BufferPoolManager::new(lru(1), dm);
        let pid = PageId::new(2);

        write(&bpm, 2, "2;1;7;null;null;null;null;0");
        for _ in 0..2 {
            let result = bpm.fetch_page_read(PageId::new(3));
            assert!(matches!(result, Err(Error::Io(_))));
            assert!(bpm.contains(pid));
            assert!(!bpm.contains(PageId::new(3)));
            assert_eq!(bpm.is_dirty(pid), Some(true));
            assert_eq!(bpm.evictable_count(), 1);
        }

        assert_eq!(read(&bpm, 2), "2;1;7;null;null;null;null;0");
        let snapshot = bpm.stats().snapshot();
        assert_eq!(snapshot.dirty_evictions, 0);
        assert_eq!(snapshot.pages_written, 0);
        assert_eq!(snapshot.evictions, 0);
    }
}

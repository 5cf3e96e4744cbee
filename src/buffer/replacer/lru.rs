//! LRU (Least-Recently-Used) replacement policy.

use std::collections::{HashSet, VecDeque};

use super::Replacer;
use crate::common::FrameId;

/// Evicts the unpinned frame whose last access is oldest.
///
/// Recency is a queue ordered from least to most recently used. Pools are
/// small, so re-ordering by linear search is cheaper than keeping a linked
/// hash map in sync.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Front = least recently used.
    recency: VecDeque<FrameId>,
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    fn unlink(&mut self, frame_id: FrameId) {
        if let Some(pos) = self.recency.iter().position(|&f| f == frame_id) {
            self.recency.remove(pos);
        }
    }
}

impl Replacer for LruReplacer {
    /// Move the frame to the most-recently-used end.
    fn record_access(&mut self, frame_id: FrameId) {
        self.unlink(frame_id);
        self.recency.push_back(frame_id);
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let pos = self
            .recency
            .iter()
            .position(|f| self.evictable.contains(f))?;
        let frame_id = self.recency.remove(pos)?;
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    fn size(&self) -> usize {
        self.evictable.len()
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}

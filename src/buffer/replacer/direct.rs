//! Direct-mapped single-frame policy.

use super::Replacer;
use crate::common::FrameId;

/// Holds at most one frame; a miss always replaces it.
///
/// Paired with a one-frame pool this gives the "one node in memory" cache:
/// fetching a different page first writes the held one back if it is dirty.
#[derive(Debug, Default)]
pub struct DirectReplacer {
    held: Option<FrameId>,
    evictable: bool,
}

impl DirectReplacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Replacer for DirectReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        if self.held != Some(frame_id) {
            self.held = Some(frame_id);
            self.evictable = false;
        }
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if self.held == Some(frame_id) {
            self.evictable = evictable;
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        if !self.evictable {
            return None;
        }
        self.evictable = false;
        self.held.take()
    }

    fn size(&self) -> usize {
        usize::from(self.held.is_some() && self.evictable)
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

//! Eviction policy implementations (replacers).
//!
//! The buffer pool talks to its policy only through [`Replacer`], so the
//! policy is picked once from [`CachePolicy`] when the pool is built:
//! - [`LruReplacer`] - least-recently-used over any number of frames
//! - [`DirectReplacer`] - a single frame that every miss replaces

mod direct;
mod lru;

pub use direct::DirectReplacer;
pub use lru::LruReplacer;

use crate::common::config::CachePolicy;
use crate::common::FrameId;

/// Decides which unpinned frame gives up its page on a miss.
pub trait Replacer: Send {
    /// Record that a frame was fetched or modified.
    fn record_access(&mut self, frame_id: FrameId);

    /// Mark whether a frame may be chosen as a victim (pin count is zero).
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);

    /// Select and forget a victim frame.
    ///
    /// Returns `None` if every tracked frame is pinned.
    fn evict(&mut self) -> Option<FrameId>;

    /// Number of evictable frames.
    fn size(&self) -> usize;

    /// Short policy name for logs.
    fn name(&self) -> &'static str;
}

/// Build the replacer for a cache policy.
pub fn for_policy(policy: CachePolicy) -> Box<dyn Replacer> {
    match policy {
        CachePolicy::Lru { .. } => Box::new(LruReplacer::new()),
        CachePolicy::Direct => Box::new(DirectReplacer::new()),
    }
}

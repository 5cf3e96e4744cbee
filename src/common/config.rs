//! Configuration for an index file.
//!
//! Layout constants live here as `const`s; everything chosen per index
//! (path, order, cache policy) goes through [`IndexConfig`].

use std::path::{Path, PathBuf};

use crate::common::{Error, PageId, Result};

/// Fixed part of the page size formula `37 + 12 * order`.
///
/// Covers the id, leaf flag, parent, prev/next pointers and separators of a
/// node record, and comfortably holds the metadata record.
pub const PAGE_SIZE_BASE: usize = 37;

/// Per-key part of the page size formula.
pub const PAGE_SIZE_PER_KEY: usize = 12;

/// Frames in the default LRU pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Smallest order that still produces two non-empty halves on an
/// internal split.
pub const MIN_ORDER: usize = 2;

/// Page 0 holds the `nextId:..;rootId:..;height:..` metadata record.
pub const METADATA_PAGE_ID: PageId = PageId(0);

/// Page 1 holds the column header of the node record format.
pub const SCHEMA_PAGE_ID: PageId = PageId(1);

/// The root leaf created for an empty index file.
pub const INITIAL_ROOT_ID: PageId = PageId(2);

/// Page size in bytes for a given tree order.
///
/// # Example
/// ```
/// use bptdb::common::config::page_size_for_order;
///
/// assert_eq!(page_size_for_order(3), 73);
/// ```
pub const fn page_size_for_order(order: usize) -> usize {
    PAGE_SIZE_BASE + PAGE_SIZE_PER_KEY * order
}

/// How the buffer pool caches pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Bounded pool with least-recently-used eviction.
    Lru {
        /// Maximum number of resident pages.
        capacity: usize,
    },
    /// Exactly one frame; loading any other page replaces it.
    Direct,
}

impl CachePolicy {
    /// Number of frames this policy needs.
    pub fn pool_size(&self) -> usize {
        match self {
            CachePolicy::Lru { capacity } => *capacity,
            CachePolicy::Direct => 1,
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy::Lru {
            capacity: DEFAULT_POOL_SIZE,
        }
    }
}

/// Everything needed to open an index file.
///
/// # Example
/// ```
/// use bptdb::{CachePolicy, IndexConfig};
///
/// let config = IndexConfig::new("index.txt", 3).with_cache_policy(CachePolicy::Direct);
/// assert_eq!(config.page_size(), 73);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Backing index file. Created if missing.
    pub path: PathBuf,
    /// Maximum keys per node before a split.
    pub order: usize,
    /// Buffer pool policy.
    pub cache_policy: CachePolicy,
    /// Overrides `37 + 12 * order` when set.
    pub page_size_override: Option<usize>,
}

impl IndexConfig {
    /// Config with the default LRU pool and the derived page size.
    pub fn new<P: AsRef<Path>>(path: P, order: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            order,
            cache_policy: CachePolicy::default(),
            page_size_override: None,
        }
    }

    /// Replace the cache policy.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Use a fixed page size instead of the one derived from the order.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size_override = Some(page_size);
        self
    }

    /// Page size used for every slot of the file.
    pub fn page_size(&self) -> usize {
        self.page_size_override
            .unwrap_or_else(|| page_size_for_order(self.order))
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.order < MIN_ORDER {
            return Err(Error::InvalidConfig(format!(
                "order must be at least {MIN_ORDER}, got {}",
                self.order
            )));
        }
        if self.cache_policy.pool_size() == 0 {
            return Err(Error::InvalidConfig(
                "buffer pool capacity must be > 0".to_string(),
            ));
        }
        let min_page = page_size_for_order(MIN_ORDER);
        if self.page_size() < min_page {
            return Err(Error::InvalidConfig(format!(
                "page size {} is below the minimum of {min_page} bytes",
                self.page_size()
            )));
        }
        Ok(())
    }
}

//! Persistent tree metadata.
//!
//! Root id, next free page id and height live in the metadata page. The
//! store reads and writes that page through the buffer pool like any other
//! page, so the cached copy never goes stale.

use tracing::trace;

use super::codec::{self, MetadataRecord};
use crate::buffer::BufferPoolManager;
use crate::common::config::{INITIAL_ROOT_ID, METADATA_PAGE_ID};
use crate::common::{PageId, Result};

/// Tree-wide state persisted next to the nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub root_id: PageId,
    /// Next page id handed out on a split. Ids are never reused.
    pub next_id: PageId,
    /// Number of levels; a lone root leaf has height 1.
    pub height: u32,
}

impl Metadata {
    /// State of a freshly created index: a single empty root leaf.
    pub fn initial() -> Self {
        Self {
            root_id: INITIAL_ROOT_ID,
            next_id: INITIAL_ROOT_ID.next(),
            height: 1,
        }
    }

    /// Hand out the next page id.
    pub fn allocate(&mut self) -> PageId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }
}

/// Reads and writes [`Metadata`] in its reserved page.
#[derive(Debug, Clone, Copy)]
pub struct MetadataStore {
    page_id: PageId,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            page_id: METADATA_PAGE_ID,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Load the stored record, or `None` if the page was never written.
    pub fn load(&self, bpm: &BufferPoolManager) -> Result<Option<MetadataRecord>> {
        let guard = bpm.fetch_page_read(self.page_id)?;
        let record = codec::decode_metadata(guard.record()?)?;
        trace!(?record, "loaded index metadata");
        Ok(record)
    }

    /// Stage `meta` in the metadata page. It reaches the file on the next
    /// flush or when the page is evicted.
    pub fn save(&self, bpm: &BufferPoolManager, meta: &Metadata) -> Result<()> {
        let encoded = codec::encode_metadata(meta);
        let mut guard = bpm.fetch_page_write(self.page_id)?;
        guard.set_record(&encoded)?;
        trace!(root = %meta.root_id, next = %meta.next_id, height = meta.height, "saved index metadata");
        Ok(())
    }
}

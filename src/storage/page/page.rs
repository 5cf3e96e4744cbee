//! Page - one fixed-size slot of the index file.
//!
//! A [`Page`] is the unit of I/O between disk and memory. Its size is fixed
//! per index file (derived from the tree order), so unlike a classic 4KB page
//! the buffer is sized at runtime.
//!
//! Every page holds exactly one text record:
//! ```text
//! ┌──────────────────────────────────────┬──────────────┬────┐
//! │ record bytes                         │ space padding│ \n │
//! └──────────────────────────────────────┴──────────────┴────┘
//!  0                                                page_size-1
//! ```

use std::str;

use crate::common::{Error, PageId, Result};

/// Byte used to pad a record up to `page_size - 1`.
pub const PAD_BYTE: u8 = b' ';

/// Final byte of every written page.
pub const RECORD_TERMINATOR: u8 = b'\n';

/// A page of data.
///
/// `Page` does not implement `Clone` outside tests; copies between a frame
/// and the disk manager are explicit `copy_from_slice` calls.
///
/// # Example
/// ```
/// use bptdb::storage::page::Page;
/// use bptdb::PageId;
///
/// let mut page = Page::new(32);
/// page.set_record(PageId::new(4), "4;1;;null;null;null;null;").unwrap();
/// assert_eq!(page.record().unwrap(), "4;1;;null;null;null;null;");
/// assert_eq!(page.as_slice()[31], b'\n');
/// ```
pub struct Page {
    data: Box<[u8]>,
}

impl Page {
    /// Create a new zeroed page of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Size of this page in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Largest record this page can hold (one byte goes to the terminator).
    #[inline]
    pub fn record_capacity(&self) -> usize {
        self.data.len().saturating_sub(1)
    }

    /// Replace the page content with `record`, padded and newline-terminated.
    ///
    /// # Errors
    /// `Error::PageOverflow` if the record is longer than
    /// [`record_capacity`](Self::record_capacity). The page is left untouched
    /// in that case.
    pub fn set_record(&mut self, page_id: PageId, record: &str) -> Result<()> {
        let bytes = record.as_bytes();
        let capacity = self.record_capacity();
        if bytes.len() > capacity || self.data.is_empty() {
            return Err(Error::PageOverflow {
                page_id,
                encoded: bytes.len(),
                capacity,
            });
        }

        self.data[..bytes.len()].copy_from_slice(bytes);
        self.data[bytes.len()..capacity].fill(PAD_BYTE);
        self.data[capacity] = RECORD_TERMINATOR;
        Ok(())
    }

    /// The record stored in this page, without padding or terminator.
    ///
    /// A never-written page (all zeros) yields an empty string.
    pub fn record(&self) -> Result<&str> {
        let end = self
            .data
            .iter()
            .position(|&b| b == RECORD_TERMINATOR || b == 0)
            .unwrap_or(self.data.len());
        let text = str::from_utf8(&self.data[..end])
            .map_err(|e| Error::format("page record", e.to_string()))?;
        Ok(text.trim_end_matches(PAD_BYTE as char))
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}

//! Page identifier type.

use std::fmt;

/// Identifies a page in the backing index file.
///
/// B+Tree node ids are page ids: node `n` lives in slot `n` of the file.
/// Ids are handed out by the tree's metadata allocator and never reused.
///
/// "No page" is spelled `Option<PageId>`; there is no sentinel value.
///
/// # Example
/// ```
/// use bptdb::PageId;
///
/// let page_id = PageId::new(3);
/// assert_eq!(page_id.offset(61), 183);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Byte offset of this page in a file of `page_size`-byte slots.
    #[inline]
    pub fn offset(&self, page_size: usize) -> u64 {
        u64::from(self.0) * page_size as u64
    }

    /// The id following this one.
    #[inline]
    pub fn next(&self) -> PageId {
        PageId(self.0 + 1)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

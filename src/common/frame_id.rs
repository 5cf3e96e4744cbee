//! Frame identifier type.

use std::fmt;

/// Index of a frame in the buffer pool's fixed frame vector.
///
/// # Example
/// ```
/// use bptdb::FrameId;
///
/// let frame_id = FrameId::new(1);
/// assert_eq!(frame_id.0, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(2)), "frame#2");
    }
}

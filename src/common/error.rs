//! Error types for bptdb.

use thiserror::Error;

use crate::common::PageId;

/// Convenient Result type alias.
///
/// Every fallible operation in the crate returns this, so callers only ever
/// have to match on one error type.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in bptdb.
///
/// Engine operations never panic on bad input or a damaged file; they return
/// one of these and leave the decision (abort the job, or log and continue)
/// to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the backing file or a collaborator file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored page, metadata record or CSV row failed to parse.
    ///
    /// `context` names what was being decoded (node id and field, metadata
    /// tag, record row) so corruption can be located.
    #[error("malformed {context}: {reason}")]
    Format { context: String, reason: String },

    /// An encoded node does not fit in its page.
    ///
    /// This means the configured order is too large for the key range in
    /// use. The record is never truncated.
    #[error("{page_id} needs {encoded} bytes but a page holds {capacity}")]
    PageOverflow {
        page_id: PageId,
        encoded: usize,
        capacity: usize,
    },

    /// A traversal reached a child or sibling id that does not resolve.
    #[error("index structure corrupted: {0}")]
    Structural(String),

    /// Buffer pool has no free frames and every resident frame is pinned.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// Rejected configuration (order too small, zero-sized pool, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Syntax error in a command script.
    #[error("command script line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// Record store lookup past the last row.
    #[error("record {0} not found")]
    RecordNotFound(u32),
}

impl Error {
    /// Shorthand for building a [`Error::Format`].
    pub(crate) fn format(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Format {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageOverflow {
            page_id: PageId::new(7),
            encoded: 80,
            capacity: 72,
        };
        assert_eq!(err.to_string(), "p7 needs 80 bytes but a page holds 72");

        let err = Error::format("node 3 field `keys`", "invalid digit");
        assert_eq!(err.to_string(), "malformed node 3 field `keys`: invalid digit");

        let err = Error::Parse {
            line: 4,
            reason: "unknown command `DEL:3`".to_string(),
        };
        assert_eq!(err.to_string(), "command script line 4: unknown command `DEL:3`");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {}
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}

//! Page layout.
//!
//! - [`Page`] - a fixed-size slot holding one padded, newline-terminated
//!   text record

#[allow(clippy::module_inception)]
mod page;

pub use page::{Page, PAD_BYTE, RECORD_TERMINATOR};

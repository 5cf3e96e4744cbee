//! Storage layer - disk I/O and page layout.
//!
//! - [`DiskManager`] - Fixed-slot file I/O
//! - [`page`] - The page buffer and its record framing

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;

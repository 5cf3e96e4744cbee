//! Disk-backed B+Tree.
//!
//! # Components
//! - [`BPlusTree`] - insert, search and structural checks
//! - [`Node`] - one node, decoded from its page
//! - [`codec`] - the text record format of nodes and metadata
//! - [`MetadataStore`] - root id, next page id and height in page 0

pub mod codec;
mod metadata;
mod node;
mod tree;

pub use metadata::{Metadata, MetadataStore};
pub use node::{Key, Node, NodeBody, Rid};
pub use tree::{BPlusTree, TreeSummary};

//! Index structures.

pub mod btree;

pub use btree::{BPlusTree, Key, Metadata, Node, NodeBody, Rid, TreeSummary};

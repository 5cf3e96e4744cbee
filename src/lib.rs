//! bptdb - an on-disk B+Tree index with a write-back buffer pool.
//!
//! # Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  workload/   command scripts, CSV record store       │
//! ├──────────────────────────────────────────────────────┤
//! │  index/      BPlusTree + node codec + metadata       │
//! ├──────────────────────────────────────────────────────┤
//! │  buffer/     BufferPoolManager, LRU | direct policy  │
//! ├──────────────────────────────────────────────────────┤
//! │  storage/    DiskManager + text-record Page          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every node occupies one fixed-size page of the index file at
//! `page_id * page_size`. Page 0 holds the tree metadata, page 1 the record
//! schema, nodes start at page 2.
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`storage`] - Page slots in the index file
//! - [`buffer`] - Page cache and eviction policies
//! - [`index`] - The B+Tree
//! - [`workload`] - Script runner used by the `bptdb` binary
//!
//! # Quick Start
//! ```no_run
//! use bptdb::{BPlusTree, CachePolicy, IndexConfig, Rid};
//!
//! let config = IndexConfig::new("index.txt", 3).with_cache_policy(CachePolicy::Direct);
//! let mut tree = BPlusTree::open(&config)?;
//! tree.insert(2019, Rid::new(0))?;
//! assert_eq!(tree.search(2019)?.len(), 1);
//! # Ok::<(), bptdb::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;
pub mod workload;

pub use common::config::{CachePolicy, IndexConfig};
pub use common::{Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, StatsSnapshot};
pub use index::{BPlusTree, Key, Metadata, Node, Rid, TreeSummary};
pub use storage::page::Page;
pub use storage::DiskManager;

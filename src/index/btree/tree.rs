//! The B+Tree engine.
//!
//! Every node lives in its own page and is reached through the buffer pool.
//! The engine holds at most one page guard at a time: a node is decoded
//! into an owned [`Node`], the guard is dropped, and changes are written
//! back with a fresh write guard. That keeps it usable with a single-frame
//! pool.

use tracing::{debug, info, trace, warn};

use super::codec::{self, SCHEMA_RECORD};
use super::metadata::{Metadata, MetadataStore};
use super::node::{Key, Node, Rid};
use crate::buffer::BufferPoolManager;
use crate::common::config::{IndexConfig, INITIAL_ROOT_ID, MIN_ORDER, SCHEMA_PAGE_ID};
use crate::common::{Error, PageId, Result};
use crate::storage::DiskManager;

/// A disk-backed B+Tree mapping [`Key`]s to [`Rid`]s.
///
/// Duplicate keys are allowed; [`search`](Self::search) returns their
/// locators in insertion order.
///
/// # Example
/// ```no_run
/// use bptdb::{BPlusTree, IndexConfig, Rid};
///
/// let mut tree = BPlusTree::open(&IndexConfig::new("wines.idx", 3))?;
/// tree.insert(2019, Rid::new(0))?;
/// tree.insert(2019, Rid::new(4))?;
/// assert_eq!(tree.search(2019)?, vec![Rid::new(0), Rid::new(4)]);
/// # Ok::<(), bptdb::Error>(())
/// ```
pub struct BPlusTree {
    bpm: BufferPoolManager,
    meta_store: MetadataStore,
    meta: Metadata,
    order: usize,
}

/// Shape of a tree that passed [`BPlusTree::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeSummary {
    pub height: u32,
    pub nodes: usize,
    pub leaves: usize,
    pub entries: usize,
}

impl BPlusTree {
    /// Open the index file named by `config`, creating and initializing it
    /// if it is missing or empty.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let dm = DiskManager::open_or_create(&config.path, config.page_size())?;
        let bpm = BufferPoolManager::new(config.cache_policy, dm);
        let tree = Self::with_buffer_pool(bpm, config.order)?;
        info!(
            path = %config.path.display(),
            order = tree.order,
            policy = ?config.cache_policy,
            root = %tree.meta.root_id,
            height = tree.meta.height,
            "opened index"
        );
        Ok(tree)
    }

    /// Build a tree on top of an existing buffer pool.
    pub fn with_buffer_pool(bpm: BufferPoolManager, order: usize) -> Result<Self> {
        if order < MIN_ORDER {
            return Err(Error::InvalidConfig(format!(
                "order must be at least {MIN_ORDER}, got {order}"
            )));
        }

        let mut tree = Self {
            bpm,
            meta_store: MetadataStore::new(),
            meta: Metadata::initial(),
            order,
        };

        match tree.meta_store.load(&tree.bpm)? {
            None => tree.initialize()?,
            Some(record) => {
                tree.meta = Metadata {
                    root_id: record.root_id,
                    next_id: record.next_id,
                    height: 1,
                };
                tree.load_node(tree.meta.root_id)?;
                tree.meta.height = match record.height {
                    Some(height) => height,
                    None => tree.height()?,
                };
            }
        }
        Ok(tree)
    }

    fn initialize(&mut self) -> Result<()> {
        self.meta = Metadata::initial();
        {
            let mut guard = self.bpm.fetch_page_write(SCHEMA_PAGE_ID)?;
            guard.set_record(SCHEMA_RECORD)?;
        }
        self.write_node(&Node::new_leaf(INITIAL_ROOT_ID))?;
        self.persist_metadata()?;
        self.bpm.flush_all_pages()?;
        debug!(root = %INITIAL_ROOT_ID, "initialized empty index");
        Ok(())
    }

    // ========================================================================
    // Public API
    // ========================================================================

    /// Insert one `(key, rid)` entry.
    ///
    /// Metadata is persisted even when a split fails halfway, so page ids
    /// consumed by the failed split are never handed out again.
    pub fn insert(&mut self, key: Key, rid: Rid) -> Result<()> {
        let inserted = self.insert_entry(key, rid);
        let persisted = self.persist_metadata();
        inserted.and(persisted)
    }

    /// All locators stored under `key`, oldest first.
    ///
    /// Descends to the leftmost leaf that can hold `key`, then follows the
    /// `next` links until a larger key shows up.
    pub fn search(&self, key: Key) -> Result<Vec<Rid>> {
        let (mut node, _) = self.descend(|node| node.child_for_search(key))?;

        let mut found = Vec::new();
        let mut visited = 1;
        loop {
            if node.collect_matches(key, &mut found) {
                break;
            }
            match node.next_leaf() {
                Some(next) => {
                    if visited > self.max_nodes() {
                        return Err(Error::Structural(format!("leaf chain loops back at {next}")));
                    }
                    node = self.load_sibling(&node, next)?;
                    visited += 1;
                }
                None => break,
            }
        }
        Ok(found)
    }

    /// Number of levels, measured by walking the leftmost path.
    pub fn height(&self) -> Result<u32> {
        let mut height = 1;
        let mut node = self.load_node(self.meta.root_id)?;
        while !node.is_leaf() {
            if height > self.max_depth() {
                return Err(Error::Structural(format!(
                    "leftmost path from {} does not end in a leaf",
                    self.meta.root_id
                )));
            }
            let child = self.child_of(&node, 0)?;
            node = self.load_node(child)?;
            height += 1;
        }
        Ok(height)
    }

    /// Write every dirty page back and sync the file.
    ///
    /// Metadata is staged after every insert, so this only has to drain the
    /// buffer pool.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        info!(stats = %self.bpm.stats().snapshot(), "flushed index");
        Ok(())
    }

    /// Current metadata.
    pub fn metadata(&self) -> Metadata {
        self.meta
    }

    pub fn root_id(&self) -> PageId {
        self.meta.root_id
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn page_size(&self) -> usize {
        self.bpm.page_size()
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }

    /// Decode the node stored in page `id`.
    pub fn node(&self, id: PageId) -> Result<Node> {
        self.load_node(id)
    }

    /// Leaf ids from left to right, following the sibling links.
    pub fn leaf_chain(&self) -> Result<Vec<PageId>> {
        let (mut node, _) = self.descend(|_| 0)?;

        let mut chain = vec![node.id];
        while let Some(next) = node.next_leaf() {
            if chain.len() > self.max_nodes() {
                return Err(Error::Structural(format!("leaf chain loops back at {next}")));
            }
            node = self.load_sibling(&node, next)?;
            chain.push(node.id);
        }
        Ok(chain)
    }

    /// All `(key, rid)` entries in leaf-chain order.
    pub fn entries(&self) -> Result<Vec<(Key, Rid)>> {
        let mut out = Vec::new();
        for id in self.leaf_chain()? {
            let leaf = self.load_node(id)?;
            out.extend(leaf.keys.iter().copied().zip(leaf.refs().iter().copied()));
        }
        Ok(out)
    }

    /// Check the structural invariants of the whole tree.
    ///
    /// Covers key order and separator bounds, node occupancy, parent
    /// pointers, uniform leaf depth, the stored height and the doubly linked
    /// leaf chain.
    pub fn verify(&self) -> Result<TreeSummary> {
        let root = self.load_node(self.meta.root_id)?;
        if root.parent.is_some() {
            return Err(Error::Structural(format!("root {} has a parent", root.id)));
        }

        let mut summary = TreeSummary::default();
        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.verify_node(
            &root,
            None,
            None,
            1,
            &mut leaf_depth,
            &mut leaves,
            &mut summary,
        )?;
        summary.height = leaf_depth.unwrap_or(1);

        if summary.height != self.meta.height {
            return Err(Error::Structural(format!(
                "stored height {} but leaves sit at depth {}",
                self.meta.height, summary.height
            )));
        }

        let chain = self.leaf_chain()?;
        if chain != leaves {
            return Err(Error::Structural(format!(
                "leaf chain {chain:?} disagrees with tree order {leaves:?}"
            )));
        }
        let mut expected_prev = None;
        for &id in &chain {
            let leaf = self.load_node(id)?;
            if leaf.prev_leaf() != expected_prev {
                return Err(Error::Structural(format!(
                    "{id} has prev {:?}, expected {expected_prev:?}",
                    leaf.prev_leaf()
                )));
            }
            expected_prev = Some(id);
        }

        Ok(summary)
    }

    // ========================================================================
    // Insert internals
    // ========================================================================

    fn insert_entry(&mut self, key: Key, rid: Rid) -> Result<()> {
        let (mut leaf, path) = self.descend_for_insert(key)?;
        leaf.insert_entry(key, rid)?;
        if leaf.len() <= self.order {
            return self.write_node(&leaf);
        }
        self.split_leaf(leaf, path)
    }

    /// Find the leaf an insert of `key` goes to, with the ids of its
    /// ancestors from the root down.
    fn descend_for_insert(&self, key: Key) -> Result<(Node, Vec<PageId>)> {
        self.descend(|node| node.child_for_insert(key))
    }

    fn split_leaf(&mut self, mut leaf: Node, path: Vec<PageId>) -> Result<()> {
        let right_id = self.meta.allocate();
        let mut right = leaf.split_leaf(right_id)?;
        let parent = path.last().copied();
        leaf.parent = parent;
        right.parent = parent;

        let separator = *right.keys.first().ok_or_else(|| {
            Error::Structural(format!("split of {} left an empty right leaf", leaf.id))
        })?;
        debug!(left = %leaf.id, right = %right_id, %separator, "split leaf");

        self.write_node(&leaf)?;
        self.write_node(&right)?;
        if let Some(next_id) = right.next_leaf() {
            let mut next = self.load_node(next_id)?;
            next.set_prev_leaf(Some(right_id))?;
            self.write_node(&next)?;
        }

        self.promote(leaf.id, separator, right_id, path)
    }

    /// Push a separator into the ancestors, splitting internal nodes until
    /// one has room or a new root is created.
    fn promote(
        &mut self,
        mut left: PageId,
        mut key: Key,
        mut right: PageId,
        mut path: Vec<PageId>,
    ) -> Result<()> {
        while let Some(parent_id) = path.pop() {
            let mut parent = self.load_node(parent_id)?;
            parent.insert_child_after(left, key, right)?;
            if parent.len() <= self.order {
                return self.write_node(&parent);
            }

            let sibling_id = self.meta.allocate();
            let (up, mut sibling) = parent.split_internal(sibling_id)?;
            let grandparent = path.last().copied();
            parent.parent = grandparent;
            sibling.parent = grandparent;
            debug!(left = %parent_id, right = %sibling_id, separator = %up, "split internal node");

            self.write_node(&parent)?;
            self.write_node(&sibling)?;
            for &child in sibling.children() {
                self.set_parent(child, sibling_id)?;
            }

            left = parent_id;
            key = up;
            right = sibling_id;
        }
        self.grow_root(left, key, right)
    }

    fn grow_root(&mut self, left: PageId, key: Key, right: PageId) -> Result<()> {
        let root_id = self.meta.allocate();
        let root = Node::new_internal(root_id, vec![key], vec![left, right]);
        self.write_node(&root)?;
        self.set_parent(left, root_id)?;
        self.set_parent(right, root_id)?;

        self.meta.root_id = root_id;
        self.meta.height += 1;
        debug!(root = %root_id, height = self.meta.height, "grew new root");
        Ok(())
    }

    fn set_parent(&self, id: PageId, parent: PageId) -> Result<()> {
        let mut node = self.load_node(id)?;
        if node.parent != Some(parent) {
            node.parent = Some(parent);
            self.write_node(&node)?;
        }
        Ok(())
    }

    // ========================================================================
    // Page access
    // ========================================================================

    /// Read and decode a node. The page guard is released before returning.
    fn load_node(&self, id: PageId) -> Result<Node> {
        if id < INITIAL_ROOT_ID || id >= self.meta.next_id {
            return Err(Error::Structural(format!(
                "{id} is outside the allocated node range {INITIAL_ROOT_ID}..{}",
                self.meta.next_id
            )));
        }

        let guard = self.bpm.fetch_page_read(id)?;
        let record = guard.record()?;
        if record.is_empty() {
            return Err(Error::Structural(format!("{id} holds no node")));
        }
        let node = codec::decode_node(record)?;
        if node.id != id {
            return Err(Error::Structural(format!(
                "page {id} holds node {}",
                node.id
            )));
        }
        Ok(node)
    }

    fn write_node(&self, node: &Node) -> Result<()> {
        let encoded = codec::encode_node(node);
        let mut guard = self.bpm.fetch_page_write(node.id)?;
        guard.set_record(&encoded)?;
        trace!(id = %node.id, len = encoded.len(), "staged node");
        Ok(())
    }

    fn persist_metadata(&self) -> Result<()> {
        self.meta_store.save(&self.bpm, &self.meta)
    }

    /// Walk from the root to a leaf, taking child `route(node)` at each
    /// internal node. Returns the leaf and the ids of its ancestors.
    fn descend(&self, route: impl Fn(&Node) -> usize) -> Result<(Node, Vec<PageId>)> {
        let mut path = Vec::with_capacity(self.meta.height as usize);
        let mut node = self.load_node(self.meta.root_id)?;
        while !node.is_leaf() {
            if path.len() as u32 >= self.max_depth() {
                return Err(Error::Structural(format!(
                    "path from {} does not end in a leaf",
                    self.meta.root_id
                )));
            }
            let child = self.child_of(&node, route(&node))?;
            path.push(node.id);
            node = self.load_node(child)?;
        }
        Ok((node, path))
    }

    /// Load the leaf that `leaf.next` points at.
    fn load_sibling(&self, leaf: &Node, next: PageId) -> Result<Node> {
        let node = self.load_node(next)?;
        if !node.is_leaf() {
            return Err(Error::Structural(format!(
                "leaf {} links to internal node {next}",
                leaf.id
            )));
        }
        Ok(node)
    }

    fn child_of(&self, node: &Node, idx: usize) -> Result<PageId> {
        node.child(idx).ok_or_else(|| {
            Error::Structural(format!("{} has no child at index {idx}", node.id))
        })
    }

    fn max_nodes(&self) -> usize {
        self.meta.next_id.0 as usize
    }

    fn max_depth(&self) -> u32 {
        self.meta.next_id.0
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_node(
        &self,
        node: &Node,
        lower: Option<Key>,
        upper: Option<Key>,
        depth: u32,
        leaf_depth: &mut Option<u32>,
        leaves: &mut Vec<PageId>,
        summary: &mut TreeSummary,
    ) -> Result<()> {
        let id = node.id;
        summary.nodes += 1;
        if depth > self.max_depth() {
            return Err(Error::Structural(format!("cycle below {id}")));
        }

        if node.keys.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::Structural(format!("{id} keys out of order: {:?}", node.keys)));
        }
        if let (Some(lo), Some(&first)) = (lower, node.keys.first()) {
            if first < lo {
                return Err(Error::Structural(format!("{id} key {first} below separator {lo}")));
            }
        }
        if let (Some(hi), Some(&last)) = (upper, node.keys.last()) {
            if last > hi {
                return Err(Error::Structural(format!("{id} key {last} above separator {hi}")));
            }
        }

        let is_root = id == self.meta.root_id;
        let min = if is_root {
            usize::from(!node.is_leaf())
        } else {
            self.order / 2
        };
        if node.len() < min || node.len() > self.order {
            return Err(Error::Structural(format!(
                "{id} holds {} keys, allowed {min}..={}",
                node.len(),
                self.order
            )));
        }

        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) if expected != depth => {
                    return Err(Error::Structural(format!(
                        "leaf {id} at depth {depth}, others at {expected}"
                    )))
                }
                Some(_) => {}
            }
            summary.leaves += 1;
            summary.entries += node.len();
            leaves.push(id);
            return Ok(());
        }

        for (i, &child_id) in node.children().iter().enumerate() {
            let child = self.load_node(child_id)?;
            if child.parent != Some(id) {
                return Err(Error::Structural(format!(
                    "{child_id} records parent {:?}, expected {id}",
                    child.parent
                )));
            }
            let child_lower = if i == 0 { lower } else { Some(node.keys[i - 1]) };
            let child_upper = node.keys.get(i).copied().or(upper);
            self.verify_node(
                &child,
                child_lower,
                child_upper,
                depth + 1,
                leaf_depth,
                leaves,
                summary,
            )?;
        }
        Ok(())
    }
}

impl Drop for BPlusTree {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush index on close");
        }
    }
}

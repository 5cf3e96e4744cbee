//! In-memory B+Tree node.
//!
//! Nodes reference each other by [`PageId`] only. Following a child or
//! sibling always goes back through the buffer pool.

use std::fmt;

use crate::common::{Error, PageId, Result};

/// Index key.
pub type Key = i32;

/// Record locator stored next to each key in a leaf.
///
/// The record-store flavour always uses `offset == 0` and `page_id` as the
/// logical row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_id: u32,
    pub offset: u32,
}

impl Rid {
    /// Locator for logical record `page_id`.
    pub fn new(page_id: u32) -> Self {
        Self { page_id, offset: 0 }
    }

    pub fn with_offset(page_id: u32, offset: u32) -> Self {
        Self { page_id, offset }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset == 0 {
            write!(f, "{}", self.page_id)
        } else {
            write!(f, "{}:{}", self.page_id, self.offset)
        }
    }
}

/// The part of a node that differs between leaves and internal nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    Leaf {
        /// Parallel to `keys`.
        refs: Vec<Rid>,
        prev: Option<PageId>,
        next: Option<PageId>,
    },
    Internal {
        /// Always `keys.len() + 1` entries.
        children: Vec<PageId>,
    },
}

/// A B+Tree node as stored in one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: PageId,
    /// Kept up to date on splits; inserts navigate with an explicit path.
    pub parent: Option<PageId>,
    /// Non-decreasing. Equal keys are legal and keep insertion order.
    pub keys: Vec<Key>,
    pub body: NodeBody,
}

impl Node {
    /// An empty leaf with no siblings.
    pub fn new_leaf(id: PageId) -> Self {
        Self {
            id,
            parent: None,
            keys: Vec::new(),
            body: NodeBody::Leaf {
                refs: Vec::new(),
                prev: None,
                next: None,
            },
        }
    }

    pub fn new_internal(id: PageId, keys: Vec<Key>, children: Vec<PageId>) -> Self {
        debug_assert_eq!(children.len(), keys.len() + 1);
        Self {
            id,
            parent: None,
            keys,
            body: NodeBody::Internal { children },
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf { .. })
    }

    /// Number of keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Child ids of an internal node; empty for a leaf.
    pub fn children(&self) -> &[PageId] {
        match &self.body {
            NodeBody::Internal { children } => children,
            NodeBody::Leaf { .. } => &[],
        }
    }

    /// Record locators of a leaf; empty for an internal node.
    pub fn refs(&self) -> &[Rid] {
        match &self.body {
            NodeBody::Leaf { refs, .. } => refs,
            NodeBody::Internal { .. } => &[],
        }
    }

    pub fn child(&self, idx: usize) -> Option<PageId> {
        self.children().get(idx).copied()
    }

    pub fn prev_leaf(&self) -> Option<PageId> {
        match self.body {
            NodeBody::Leaf { prev, .. } => prev,
            NodeBody::Internal { .. } => None,
        }
    }

    pub fn next_leaf(&self) -> Option<PageId> {
        match self.body {
            NodeBody::Leaf { next, .. } => next,
            NodeBody::Internal { .. } => None,
        }
    }

    /// Re-point the left sibling link of a leaf.
    pub fn set_prev_leaf(&mut self, id: Option<PageId>) -> Result<()> {
        match &mut self.body {
            NodeBody::Leaf { prev, .. } => {
                *prev = id;
                Ok(())
            }
            NodeBody::Internal { .. } => Err(Error::Structural(format!(
                "{} is linked as a leaf sibling but is internal",
                self.id
            ))),
        }
    }

    /// Child slot an insert of `key` descends into.
    ///
    /// Counts keys `<= key`, so equal keys route right and a new duplicate
    /// lands after every existing copy.
    pub fn child_for_insert(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Child slot a search for `key` descends into.
    ///
    /// Counts keys `< key`, reaching the leftmost leaf that can hold `key`;
    /// the search then walks right along the leaf chain.
    pub fn child_for_search(&self, key: Key) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    /// Insert an entry into a leaf after all keys `<= key`.
    pub fn insert_entry(&mut self, key: Key, rid: Rid) -> Result<()> {
        let pos = self.keys.partition_point(|&k| k <= key);
        match &mut self.body {
            NodeBody::Leaf { refs, .. } => {
                self.keys.insert(pos, key);
                refs.insert(pos, rid);
                Ok(())
            }
            NodeBody::Internal { .. } => Err(Error::Structural(format!(
                "descent ended at internal node {}",
                self.id
            ))),
        }
    }

    /// Push `key` and `right` into an internal node directly after `left`.
    ///
    /// Placing the new child next to the one that split keeps separator
    /// order correct even when the promoted key has duplicates here.
    pub fn insert_child_after(&mut self, left: PageId, key: Key, right: PageId) -> Result<()> {
        let id = self.id;
        let NodeBody::Internal { children } = &mut self.body else {
            return Err(Error::Structural(format!(
                "leaf {id} appears as a parent on the insert path"
            )));
        };
        let pos = children.iter().position(|&c| c == left).ok_or_else(|| {
            Error::Structural(format!("{left} is not a child of its path parent {id}"))
        })?;

        self.keys.insert(pos, key);
        children.insert(pos + 1, right);
        Ok(())
    }

    /// Split an overfull leaf, keeping `[0, m)` with `m = ceil(len / 2)`.
    ///
    /// Returns the new right sibling with id `right_id`. The leaf's `next`
    /// now points at it; the caller must still repoint the old right
    /// neighbour's `prev`. The separator to promote is the sibling's first
    /// key (copy-up).
    pub fn split_leaf(&mut self, right_id: PageId) -> Result<Node> {
        let m = self.keys.len().div_ceil(2);
        let left_id = self.id;
        let NodeBody::Leaf { refs, next, .. } = &mut self.body else {
            return Err(Error::Structural(format!("{left_id} split as leaf but is internal")));
        };

        let right = Node {
            id: right_id,
            parent: self.parent,
            keys: self.keys.split_off(m),
            body: NodeBody::Leaf {
                refs: refs.split_off(m),
                prev: Some(left_id),
                next: *next,
            },
        };
        *next = Some(right_id);
        Ok(right)
    }

    /// Split an overfull internal node around `m = len / 2`.
    ///
    /// Key `m` moves up and is returned; it stays in neither half. The left
    /// half keeps `[0, m)` keys and `[0, m]` children, the new node gets the
    /// rest (move-up).
    pub fn split_internal(&mut self, right_id: PageId) -> Result<(Key, Node)> {
        let m = self.keys.len() / 2;
        let left_id = self.id;
        let NodeBody::Internal { children } = &mut self.body else {
            return Err(Error::Structural(format!("{left_id} split as internal but is a leaf")));
        };

        let right_keys = self.keys.split_off(m + 1);
        let promoted = self.keys.pop().ok_or_else(|| {
            Error::Structural(format!("internal node {left_id} split with no keys"))
        })?;
        let right_children = children.split_off(m + 1);

        let mut right = Node::new_internal(right_id, right_keys, right_children);
        right.parent = self.parent;
        Ok((promoted, right))
    }

    /// Append every locator stored under `key` to `out`.
    ///
    /// Returns `true` once a key greater than `key` is seen, meaning no
    /// later leaf can hold more matches.
    pub fn collect_matches(&self, key: Key, out: &mut Vec<Rid>) -> bool {
        for (&k, &rid) in self.keys.iter().zip(self.refs()) {
            if k == key {
                out.push(rid);
            } else if k > key {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u32) -> PageId {
        PageId::new(id)
    }

    fn leaf(id: u32, keys: &[Key]) -> Node {
        let mut node = Node::new_leaf(pid(id));
        for (i, &k) in keys.iter().enumerate() {
            node.insert_entry(k, Rid::new(i as u32)).unwrap();
        }
        node
    }

    #[test]
    fn test_insert_entry_keeps_duplicates_fifo() {
        let mut node = leaf(2, &[10, 20]);
        node.insert_entry(10, Rid::new(7)).unwrap();
        node.insert_entry(5, Rid::new(8)).unwrap();

        assert_eq!(node.keys, vec![5, 10, 10, 20]);
        assert_eq!(
            node.refs(),
            &[Rid::new(8), Rid::new(0), Rid::new(7), Rid::new(1)]
        );
    }

    #[test]
    fn test_insert_entry_rejects_internal() {
        let mut node = Node::new_internal(pid(4), vec![10], vec![pid(2), pid(3)]);
        assert!(matches!(
            node.insert_entry(1, Rid::new(0)),
            Err(Error::Structural(_))
        ));
    }

    #[test]
    fn test_child_routing() {
        let node = Node::new_internal(pid(9), vec![10, 20, 20], vec![pid(2), pid(3), pid(4), pid(5)]);

        assert_eq!(node.child_for_insert(5), 0);
        assert_eq!(node.child_for_insert(10), 1);
        assert_eq!(node.child_for_insert(20), 3);
        assert_eq!(node.child_for_insert(99), 3);

        assert_eq!(node.child_for_search(10), 0);
        assert_eq!(node.child_for_search(11), 1);
        assert_eq!(node.child_for_search(20), 1);
        assert_eq!(node.child_for_search(21), 3);
    }

    #[test]
    fn test_split_leaf_odd() {
        let mut node = leaf(2, &[5, 6, 10, 20, 30]);
        if let NodeBody::Leaf { next, .. } = &mut node.body {
            *next = Some(pid(8));
        }

        let right = node.split_leaf(pid(9)).unwrap();

        assert_eq!(node.keys, vec![5, 6, 10]);
        assert_eq!(right.keys, vec![20, 30]);
        assert_eq!(right.refs().len(), 2);
        assert_eq!(node.next_leaf(), Some(pid(9)));
        assert_eq!(right.prev_leaf(), Some(pid(2)));
        assert_eq!(right.next_leaf(), Some(pid(8)));
    }

    #[test]
    fn test_split_leaf_even() {
        let mut node = leaf(2, &[5, 6, 10, 20]);
        let right = node.split_leaf(pid(3)).unwrap();
        assert_eq!(node.keys, vec![5, 6]);
        assert_eq!(right.keys, vec![10, 20]);
        assert_eq!(right.refs(), &[Rid::new(2), Rid::new(3)]);
    }

    #[test]
    fn test_split_internal_moves_middle_key_up() {
        let mut node = Node::new_internal(
            pid(10),
            vec![1, 2, 3, 4],
            vec![pid(2), pid(3), pid(4), pid(5), pid(6)],
        );
        node.parent = Some(pid(11));

        let (promoted, right) = node.split_internal(pid(12)).unwrap();

        assert_eq!(promoted, 3);
        assert_eq!(node.keys, vec![1, 2]);
        assert_eq!(node.children(), &[pid(2), pid(3), pid(4)]);
        assert_eq!(right.keys, vec![4]);
        assert_eq!(right.children(), &[pid(5), pid(6)]);
        assert_eq!(right.parent, Some(pid(11)));
    }

    #[test]
    fn test_insert_child_after() {
        let mut node = Node::new_internal(pid(9), vec![10, 10], vec![pid(2), pid(3), pid(4)]);
        node.insert_child_after(pid(3), 10, pid(7)).unwrap();

        assert_eq!(node.keys, vec![10, 10, 10]);
        assert_eq!(node.children(), &[pid(2), pid(3), pid(7), pid(4)]);

        assert!(matches!(
            node.insert_child_after(pid(99), 1, pid(8)),
            Err(Error::Structural(_))
        ));
    }

    #[test]
    fn test_collect_matches() {
        let node = leaf(2, &[3, 5, 5, 8]);
        let mut out = Vec::new();

        assert!(node.collect_matches(5, &mut out));
        assert_eq!(out, vec![Rid::new(1), Rid::new(2)]);

        out.clear();
        assert!(!node.collect_matches(8, &mut out));
        assert_eq!(out, vec![Rid::new(3)]);
    }

    #[test]
    fn test_rid_display() {
        assert_eq!(Rid::new(12).to_string(), "12");
        assert_eq!(Rid::with_offset(12, 3).to_string(), "12:3");
    }
}

//! Integration tests for the B+Tree engine.

use std::collections::BTreeMap;

use bptdb::index::btree::codec;
use bptdb::{BPlusTree, CachePolicy, Error, IndexConfig, Key, PageId, Rid};
use proptest::prelude::*;
use tempfile::{tempdir, TempDir};

fn open(order: usize, policy: CachePolicy) -> (TempDir, BPlusTree) {
    let dir = tempdir().unwrap();
    let config = IndexConfig::new(dir.path().join("index.txt"), order).with_cache_policy(policy);
    let tree = BPlusTree::open(&config).unwrap();
    (dir, tree)
}

/// Insert `keys` with rid = position and return the expected contents.
fn load(tree: &mut BPlusTree, keys: &[Key]) -> BTreeMap<Key, Vec<Rid>> {
    let mut expected: BTreeMap<Key, Vec<Rid>> = BTreeMap::new();
    for (i, &key) in keys.iter().enumerate() {
        let rid = Rid::new(i as u32);
        tree.insert(key, rid).unwrap();
        expected.entry(key).or_default().push(rid);
    }
    expected
}

#[test]
fn test_search_finds_every_duplicate() {
    let (_dir, mut tree) = open(3, CachePolicy::default());
    let keys: Vec<Key> = (0..300).map(|i| 2000 + (i * 7) % 23).collect();
    let expected = load(&mut tree, &keys);

    for (key, rids) in &expected {
        assert_eq!(&tree.search(*key).unwrap(), rids, "key {key}");
    }
    assert!(tree.search(1999).unwrap().is_empty());
    assert!(tree.search(2023).unwrap().is_empty());
    tree.verify().unwrap();
}

#[test]
fn test_leaf_chain_is_sorted_and_complete() {
    let (_dir, mut tree) = open(4, CachePolicy::default());
    let keys: Vec<Key> = (0..150).map(|i| (i * 53) % 97 - 40).collect();
    load(&mut tree, &keys);

    let entries = tree.entries().unwrap();
    assert_eq!(entries.len(), keys.len());
    assert!(entries.windows(2).all(|w| w[0].0 <= w[1].0));

    let chain = tree.leaf_chain().unwrap();
    let first = tree.node(chain[0]).unwrap();
    let last = tree.node(*chain.last().unwrap()).unwrap();
    assert_eq!(first.prev_leaf(), None);
    assert_eq!(last.next_leaf(), None);
}

#[test]
fn test_height_grows_only_with_new_root() {
    let (_dir, mut tree) = open(2, CachePolicy::default());
    let mut last = tree.height().unwrap();
    let mut root = tree.root_id();
    for i in 0..120 {
        tree.insert(i % 31, Rid::new(i as u32)).unwrap();
        let height = tree.height().unwrap();
        if tree.root_id() != root {
            assert_eq!(height, last + 1, "root moved on insert {i}");
        } else {
            assert_eq!(height, last, "height changed without a new root on insert {i}");
        }
        assert_eq!(height, tree.metadata().height);
        last = height;
        root = tree.root_id();
    }
    assert!(last >= 4);
}

#[test]
fn test_ids_only_grow() {
    let (_dir, mut tree) = open(3, CachePolicy::default());
    let mut next = tree.metadata().next_id;
    for i in 0..80 {
        tree.insert(i, Rid::new(i as u32)).unwrap();
        let meta = tree.metadata();
        assert!(meta.next_id >= next);
        assert!(meta.root_id < meta.next_id);
        next = meta.next_id;
    }
}

#[test]
fn test_reopen_across_policies() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.txt");
    let keys: Vec<Key> = (0..90).map(|i| (i * 11) % 29).collect();

    let expected = {
        let config = IndexConfig::new(&path, 3).with_cache_policy(CachePolicy::Direct);
        let mut tree = BPlusTree::open(&config).unwrap();
        load(&mut tree, &keys)
    };

    let config = IndexConfig::new(&path, 3).with_cache_policy(CachePolicy::Lru { capacity: 4 });
    let mut tree = BPlusTree::open(&config).unwrap();
    for (key, rids) in &expected {
        assert_eq!(&tree.search(*key).unwrap(), rids);
    }

    tree.insert(5, Rid::new(1000)).unwrap();
    assert_eq!(tree.search(5).unwrap().last(), Some(&Rid::new(1000)));
    tree.verify().unwrap();
}

#[test]
fn test_index_file_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.txt");
    {
        let mut tree = BPlusTree::open(&IndexConfig::new(&path, 3)).unwrap();
        for (i, key) in [10, 20, 5, 6].into_iter().enumerate() {
            tree.insert(key, Rid::new(i as u32)).unwrap();
        }
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let slots: Vec<&str> = text.split_inclusive('\n').collect();
    assert_eq!(slots.len(), 5);
    assert!(slots.iter().all(|slot| slot.len() == 73));
    assert_eq!(slots[0].trim_end(), "nextId:5;rootId:4;height:2");
    assert_eq!(slots[1].trim_end(), codec::SCHEMA_RECORD);
    assert_eq!(slots[2].trim_end(), "2;1;5,6;4;null;null;3;2,3");
    assert_eq!(slots[3].trim_end(), "3;1;10,20;4;null;2;null;0,1");
    assert_eq!(slots[4].trim_end(), "4;0;10;null;2,3;null;null;");
}

#[test]
fn test_reopen_without_stored_height() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.txt");
    let page_size = 37 + 12 * 2;
    let meta = {
        let mut tree = BPlusTree::open(&IndexConfig::new(&path, 2)).unwrap();
        load(&mut tree, &(0..20).collect::<Vec<_>>());
        tree.metadata()
    };
    assert!(meta.height > 1);

    let mut bytes = std::fs::read(&path).unwrap();
    let record = format!("nextId:{};rootId:{}", meta.next_id.0, meta.root_id.0);
    bytes[..page_size - 1].fill(b' ');
    bytes[..record.len()].copy_from_slice(record.as_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let tree = BPlusTree::open(&IndexConfig::new(&path, 2)).unwrap();
    assert_eq!(tree.metadata(), meta);
}

#[test]
fn test_overflowing_page_is_reported() {
    let dir = tempdir().unwrap();
    let config = IndexConfig::new(dir.path().join("index.txt"), 3).with_page_size(61);
    let mut tree = BPlusTree::open(&config).unwrap();

    let wide = 1_000_000_000;
    let result = (0..3).try_for_each(|i| tree.insert(wide + i, Rid::new(4_000_000_000)));
    assert!(matches!(result, Err(Error::PageOverflow { .. })));
}

#[test]
fn test_corrupted_node_is_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.txt");
    drop(BPlusTree::open(&IndexConfig::new(&path, 3)).unwrap());

    let mut bytes = std::fs::read(&path).unwrap();
    let slot = 2 * 73;
    bytes[slot..slot + 4].copy_from_slice(b"2;x;");
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        BPlusTree::open(&IndexConfig::new(&path, 3)),
        Err(Error::Format { .. })
    ));
}

/// Build the four-key tree from `test_index_file_layout`, then overwrite
/// node 3 with `record`.
fn corrupt_right_leaf(path: &std::path::Path, record: &str) {
    {
        let mut tree = BPlusTree::open(&IndexConfig::new(path, 3)).unwrap();
        load(&mut tree, &[10, 20, 5, 6]);
    }
    let mut bytes = std::fs::read(path).unwrap();
    let slot = &mut bytes[3 * 73..4 * 73];
    slot[..72].fill(b' ');
    slot[..record.len()].copy_from_slice(record.as_bytes());
    std::fs::write(path, &bytes).unwrap();
}

#[test]
fn test_cyclic_leaf_chain_is_structural() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.txt");
    corrupt_right_leaf(&path, "3;1;10,20;4;null;2;2;0,1");

    let tree = BPlusTree::open(&IndexConfig::new(&path, 3)).unwrap();
    assert!(matches!(tree.search(99), Err(Error::Structural(_))));
    assert!(matches!(tree.leaf_chain(), Err(Error::Structural(_))));
    assert_eq!(tree.search(10).unwrap(), vec![Rid::new(0)]);
}

#[test]
fn test_leaf_linked_to_internal_node_is_structural() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.txt");
    corrupt_right_leaf(&path, "3;1;10,20;4;null;2;4;0,1");

    let tree = BPlusTree::open(&IndexConfig::new(&path, 3)).unwrap();
    assert!(matches!(tree.search(99), Err(Error::Structural(_))));
    assert!(matches!(tree.entries(), Err(Error::Structural(_))));
}

#[test]
fn test_root_has_no_parent_after_growth() {
    let (_dir, mut tree) = open(2, CachePolicy::Direct);
    load(&mut tree, &(0..40).collect::<Vec<_>>());
    let root = tree.node(tree.root_id()).unwrap();
    assert_eq!(root.parent, None);
    assert!(!root.is_leaf());
    assert!(tree.root_id() > PageId::new(2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_search_matches_model(
        order in 2usize..6,
        keys in proptest::collection::vec(-50i32..50, 0..120),
    ) {
        let (_dir, mut tree) = open(order, CachePolicy::Lru { capacity: 8 });
        let expected = load(&mut tree, &keys);

        for key in -52..52 {
            let want = expected.get(&key).cloned().unwrap_or_default();
            prop_assert_eq!(tree.search(key).unwrap(), want);
        }
        let summary = tree.verify().unwrap();
        prop_assert_eq!(summary.entries, keys.len());
    }

    #[test]
    fn prop_direct_matches_lru(keys in proptest::collection::vec(0i32..30, 1..80)) {
        let (_a, mut lru) = open(3, CachePolicy::default());
        let (_b, mut direct) = open(3, CachePolicy::Direct);
        load(&mut lru, &keys);
        load(&mut direct, &keys);

        prop_assert_eq!(lru.metadata(), direct.metadata());
        prop_assert_eq!(lru.entries().unwrap(), direct.entries().unwrap());
    }
}

//! Forward iterator over B+ tree leaves.

use super::key::{IndexKey, KeyComparator};
use super::page::BTreeLeafPage;
use super::tree::BPlusTree;
use crate::rid::RecordId;
use parking_lot::RwLockReadGuard;

/// Forward iterator yielding (key, record id) pairs in key order.
///
/// The iterator holds the tree latch in shared mode for its lifetime and
/// keeps a pin on the leaf it is positioned on; exhausting a leaf unpins
/// it and follows the next-leaf pointer. Exhaustion of the chain is the
/// end of iteration.
pub struct TreeIter<'a, C: KeyComparator> {
    /// The tree being iterated.
    tree: &'a BPlusTree<C>,
    /// Shared tree latch held for the iterator's lifetime.
    _latch: RwLockReadGuard<'a, ()>,
    /// Current leaf (its frame stays pinned), or None once exhausted.
    leaf: Option<BTreeLeafPage>,
    /// Position within the current leaf.
    index: usize,
}

impl<'a, C: KeyComparator> TreeIter<'a, C> {
    pub(crate) fn new(
        tree: &'a BPlusTree<C>,
        latch: RwLockReadGuard<'a, ()>,
        leaf: Option<BTreeLeafPage>,
        index: usize,
    ) -> Self {
        Self {
            tree,
            _latch: latch,
            leaf,
            index,
        }
    }
}

impl<C: KeyComparator> Iterator for TreeIter<'_, C> {
    type Item = (IndexKey, RecordId);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (next_id, current_id) = match self.leaf.as_ref() {
                None => return None,
                Some(leaf) => {
                    if self.index < leaf.size() as usize {
                        let item = (leaf.key_at(self.index), leaf.record_at(self.index));
                        self.index += 1;
                        return Some(item);
                    }
                    (leaf.next_page_id(), leaf.page_id())
                }
            };

            // Leaf exhausted: drop its pin and hop to the next one.
            self.tree.unpin_leaf(current_id);
            self.leaf = None;

            if !next_id.is_valid() {
                return None;
            }
            match self.tree.fetch_leaf_pinned(next_id) {
                Ok(next_leaf) => {
                    self.leaf = Some(next_leaf);
                    self.index = 0;
                }
                Err(_) => return None,
            }
        }
    }
}

impl<C: KeyComparator> Drop for TreeIter<'_, C> {
    fn drop(&mut self) {
        if let Some(leaf) = &self.leaf {
            self.tree.unpin_leaf(leaf.page_id());
        }
    }
}

//! Disk-resident B+ tree index over the buffer pool.

use super::header::HeaderPage;
use super::iterator::TreeIter;
use super::key::{IndexKey, KeyComparator};
use super::page::{BTreeInternalPage, BTreeLeafPage, BTreePageHeader, IndexPageType};
use crate::rid::RecordId;
use parking_lot::RwLock;
use silt_buffer::BufferPool;
use silt_common::page::{PageId, PAGE_SIZE};
use silt_common::{Result, SiltError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A tree node copied out of its frame.
pub(crate) enum Node {
    Leaf(BTreeLeafPage),
    Internal(BTreeInternalPage),
}

/// An ordered key-to-record-id index persisted through the buffer pool.
///
/// Keys are unique and compared through the injected comparator. Node
/// capacities are fixed at construction. Every node access goes through
/// the buffer pool: pages are pinned, copied out, mutated, written back,
/// and unpinned; a whole-tree reader-writer latch serializes writers
/// against readers and iteration.
///
/// Root changes are persisted to the header page (page 0) under the
/// index's name, so a tree can be reopened against an existing pool.
pub struct BPlusTree<C: KeyComparator> {
    /// Name under which the root is registered on the header page.
    index_name: String,
    /// Buffer pool backing every page access.
    bpm: Arc<BufferPool>,
    /// Injected key ordering.
    comparator: C,
    /// Leaf capacity.
    leaf_max_size: u16,
    /// Internal fan-out capacity.
    internal_max_size: u16,
    /// Current root page id (PageId::INVALID when the tree is empty).
    root_page_id: AtomicU32,
    /// Whole-tree latch: shared for reads and iteration, exclusive for
    /// structural changes.
    latch: RwLock<()>,
}

impl<C: KeyComparator> BPlusTree<C> {
    /// Opens (or registers) the named index on the given buffer pool.
    ///
    /// The header page is created if the pool is fresh; an existing
    /// registration for the name restores the root page id.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPool>,
        comparator: C,
        leaf_max_size: u16,
        internal_max_size: u16,
    ) -> Result<Self> {
        let index_name = index_name.into();

        let root = match bpm.fetch_page(PageId::HEADER) {
            Ok(frame) => {
                let header = HeaderPage::from_bytes(&frame.read_data());
                bpm.unpin_page(PageId::HEADER, false);
                header.get_root_id(&index_name).unwrap_or(PageId::INVALID)
            }
            Err(_) => {
                // Fresh database: the first allocation is the header page.
                let frame = bpm.new_page()?;
                let page_id = frame.page_id().expect("new page has an id");
                bpm.unpin_page(page_id, true);
                if page_id != PageId::HEADER {
                    return Err(SiltError::Internal(format!(
                        "header page allocated as {}",
                        page_id
                    )));
                }
                PageId::INVALID
            }
        };

        Ok(Self {
            index_name,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            root_page_id: AtomicU32::new(root.0),
            latch: RwLock::new(()),
        })
    }

    /// Returns the index name.
    pub fn name(&self) -> &str {
        &self.index_name
    }

    /// Returns the current root page id.
    pub fn root_page_id(&self) -> PageId {
        PageId(self.root_page_id.load(Ordering::Acquire))
    }

    fn set_root_page_id(&self, page_id: PageId) {
        self.root_page_id.store(page_id.0, Ordering::Release);
    }

    /// Returns true if the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        !self.root_page_id().is_valid()
    }

    /// Records the current root under the index name on the header page.
    fn persist_root(&self) -> Result<()> {
        let frame = self.bpm.fetch_page(PageId::HEADER)?;
        let mut header = HeaderPage::from_bytes(&frame.read_data());

        let root = self.root_page_id();
        if !header.update_record(&self.index_name, root) {
            header.insert_record(&self.index_name, root);
        }

        frame.copy_from(header.as_bytes());
        self.bpm.unpin_page(PageId::HEADER, true);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Node I/O
    // ------------------------------------------------------------------

    fn read_node(&self, page_id: PageId) -> Result<Node> {
        let guard = self.bpm.read_page(page_id)?;
        let data = guard.data();
        match IndexPageType::of_page(&**data) {
            Some(IndexPageType::Leaf) => Ok(Node::Leaf(BTreeLeafPage::from_bytes(&data))),
            Some(IndexPageType::Internal) => {
                Ok(Node::Internal(BTreeInternalPage::from_bytes(&data)))
            }
            None => Err(SiltError::TreeCorrupted(format!(
                "unknown page type on {}",
                page_id
            ))),
        }
    }

    fn read_leaf(&self, page_id: PageId) -> Result<BTreeLeafPage> {
        match self.read_node(page_id)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(SiltError::TreeCorrupted(format!(
                "expected leaf at {}",
                page_id
            ))),
        }
    }

    fn read_internal(&self, page_id: PageId) -> Result<BTreeInternalPage> {
        match self.read_node(page_id)? {
            Node::Internal(node) => Ok(node),
            Node::Leaf(_) => Err(SiltError::TreeCorrupted(format!(
                "expected internal node at {}",
                page_id
            ))),
        }
    }

    fn write_page_bytes(&self, page_id: PageId, bytes: &[u8; PAGE_SIZE]) -> Result<()> {
        let guard = self.bpm.write_page(page_id)?;
        guard.data_mut().copy_from_slice(bytes);
        guard.set_dirty();
        Ok(())
    }

    fn write_leaf(&self, leaf: &BTreeLeafPage) -> Result<()> {
        self.write_page_bytes(leaf.page_id(), leaf.as_bytes())
    }

    fn write_internal(&self, node: &BTreeInternalPage) -> Result<()> {
        self.write_page_bytes(node.page_id(), node.as_bytes())
    }

    fn new_leaf(&self, parent_page_id: PageId) -> Result<BTreeLeafPage> {
        let frame = self.bpm.new_page()?;
        let page_id = frame.page_id().expect("new page has an id");
        let leaf = BTreeLeafPage::new(page_id, parent_page_id, self.leaf_max_size);
        frame.copy_from(leaf.as_bytes());
        self.bpm.unpin_page(page_id, true);
        Ok(leaf)
    }

    fn new_internal(&self, parent_page_id: PageId) -> Result<BTreeInternalPage> {
        let frame = self.bpm.new_page()?;
        let page_id = frame.page_id().expect("new page has an id");
        let node = BTreeInternalPage::new(page_id, parent_page_id, self.internal_max_size);
        frame.copy_from(node.as_bytes());
        self.bpm.unpin_page(page_id, true);
        Ok(node)
    }

    /// Rewrites a node's parent back-pointer in place.
    fn set_parent(&self, page_id: PageId, parent_page_id: PageId) -> Result<()> {
        let guard = self.bpm.write_page(page_id)?;
        guard.data_mut()[BTreePageHeader::PARENT_OFFSET..BTreePageHeader::PARENT_OFFSET + 4]
            .copy_from_slice(&parent_page_id.0.to_le_bytes());
        guard.set_dirty();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Descends from the root to the leaf that owns the key.
    fn find_leaf(&self, key: &IndexKey) -> Result<BTreeLeafPage> {
        let mut page_id = self.root_page_id();
        loop {
            match self.read_node(page_id)? {
                Node::Leaf(leaf) => return Ok(leaf),
                Node::Internal(node) => page_id = node.lookup_child(key, &self.comparator),
            }
        }
    }

    /// Follows the leftmost child pointers down to the first leaf.
    fn find_leftmost_leaf_id(&self) -> Result<PageId> {
        let mut page_id = self.root_page_id();
        loop {
            match self.read_node(page_id)? {
                Node::Leaf(leaf) => return Ok(leaf.page_id()),
                Node::Internal(node) => page_id = node.child_at(0),
            }
        }
    }

    /// Point lookup. Returns every record id stored under the key (at
    /// most one, since keys are unique).
    pub fn get_value(&self, key: &IndexKey) -> Result<Vec<RecordId>> {
        let _latch = self.latch.read();

        if self.is_empty() {
            return Ok(Vec::new());
        }
        let leaf = self.find_leaf(key)?;
        Ok(leaf.lookup(key, &self.comparator).into_iter().collect())
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Inserts a unique key. Returns false (tree unchanged) on a
    /// duplicate.
    pub fn insert(&self, key: IndexKey, record_id: RecordId) -> Result<bool> {
        let _latch = self.latch.write();

        if self.is_empty() {
            let mut root = self.new_leaf(PageId::INVALID)?;
            root.insert_by_key(key, record_id, &self.comparator);
            self.write_leaf(&root)?;
            self.set_root_page_id(root.page_id());
            self.persist_root()?;
            return Ok(true);
        }

        let mut leaf = self.find_leaf(&key)?;
        if !leaf.insert_by_key(key, record_id, &self.comparator) {
            return Ok(false);
        }

        if leaf.size() == leaf.max_size() {
            self.split_leaf(leaf)?;
        } else {
            self.write_leaf(&leaf)?;
        }
        Ok(true)
    }

    /// Splits a full leaf, moving its upper half into a new sibling and
    /// propagating the separator upward.
    fn split_leaf(&self, mut leaf: BTreeLeafPage) -> Result<()> {
        let parent_id = leaf.parent_page_id();
        let mut sibling = self.new_leaf(parent_id)?;
        leaf.move_half_to(&mut sibling);
        let separator = sibling.key_at(0);

        if !parent_id.is_valid() {
            // Root split: a fresh internal root adopts both halves.
            let mut new_root = self.new_internal(PageId::INVALID)?;
            new_root.set_entry_at(0, separator, leaf.page_id());
            new_root.set_entry_at(1, separator, sibling.page_id());
            new_root.set_size(2);

            leaf.set_parent_page_id(new_root.page_id());
            sibling.set_parent_page_id(new_root.page_id());

            self.write_leaf(&leaf)?;
            self.write_leaf(&sibling)?;
            self.write_internal(&new_root)?;

            self.set_root_page_id(new_root.page_id());
            self.persist_root()?;
            return Ok(());
        }

        self.write_leaf(&leaf)?;
        self.write_leaf(&sibling)?;
        self.insert_into_parent(parent_id, separator, sibling.page_id())
    }

    /// Adds (separator, new child) to a parent, splitting it when full.
    fn insert_into_parent(
        &self,
        parent_id: PageId,
        key: IndexKey,
        child_id: PageId,
    ) -> Result<()> {
        let mut parent = self.read_internal(parent_id)?;

        if parent.size() < parent.max_size() {
            parent.insert_by_key(key, child_id, &self.comparator);
            self.write_internal(&parent)?;
            return Ok(());
        }

        self.split_internal(parent, key, child_id)
    }

    /// Splits a full internal node while absorbing one more child, then
    /// recurses upward with the promoted separator.
    fn split_internal(
        &self,
        mut node: BTreeInternalPage,
        key: IndexKey,
        child_id: PageId,
    ) -> Result<()> {
        let parent_id = node.parent_page_id();
        let mut sibling = self.new_internal(parent_id)?;
        let separator = node.split_with(key, child_id, &mut sibling, &self.comparator);

        if !parent_id.is_valid() {
            let mut new_root = self.new_internal(PageId::INVALID)?;
            new_root.set_entry_at(0, separator, node.page_id());
            new_root.set_entry_at(1, separator, sibling.page_id());
            new_root.set_size(2);

            node.set_parent_page_id(new_root.page_id());
            sibling.set_parent_page_id(new_root.page_id());

            self.write_internal(&node)?;
            self.write_internal(&sibling)?;
            self.write_internal(&new_root)?;

            for i in 0..sibling.size() as usize {
                self.set_parent(sibling.child_at(i), sibling.page_id())?;
            }

            self.set_root_page_id(new_root.page_id());
            self.persist_root()?;
            return Ok(());
        }

        self.write_internal(&node)?;
        self.write_internal(&sibling)?;
        for i in 0..sibling.size() as usize {
            self.set_parent(sibling.child_at(i), sibling.page_id())?;
        }
        self.insert_into_parent(parent_id, separator, sibling.page_id())
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Removes a key. Returns false (tree unchanged) if it is absent.
    pub fn remove(&self, key: &IndexKey) -> Result<bool> {
        let _latch = self.latch.write();

        if self.is_empty() {
            return Ok(false);
        }

        let mut leaf = self.find_leaf(key)?;
        if !leaf.remove_by_key(key, &self.comparator) {
            return Ok(false);
        }

        if !leaf.parent_page_id().is_valid() {
            // Root leaf: no rebalancing, but an emptied root unroots the
            // tree entirely.
            if leaf.size() == 0 {
                self.bpm.delete_page(leaf.page_id())?;
                self.set_root_page_id(PageId::INVALID);
                self.persist_root()?;
            } else {
                self.write_leaf(&leaf)?;
            }
            return Ok(true);
        }

        if leaf.size() >= leaf.min_size() {
            self.write_leaf(&leaf)?;
            return Ok(true);
        }

        self.handle_leaf_underflow(leaf)?;
        Ok(true)
    }

    /// Picks the sibling to rebalance with: a left sibling with spare
    /// capacity wins, then a right sibling with spare capacity, then the
    /// left (merge partner).
    fn choose_leaf_sibling(
        &self,
        parent: &BTreeInternalPage,
        target_index: usize,
    ) -> Result<(BTreeLeafPage, usize)> {
        let fanout = parent.size() as usize;
        if target_index == 0 {
            return Ok((self.read_leaf(parent.child_at(1))?, 1));
        }
        if target_index + 1 == fanout {
            return Ok((
                self.read_leaf(parent.child_at(target_index - 1))?,
                target_index - 1,
            ));
        }

        let left = self.read_leaf(parent.child_at(target_index - 1))?;
        if left.size() > left.min_size() {
            return Ok((left, target_index - 1));
        }
        let right = self.read_leaf(parent.child_at(target_index + 1))?;
        if right.size() > right.min_size() {
            return Ok((right, target_index + 1));
        }
        Ok((left, target_index - 1))
    }

    fn choose_internal_sibling(
        &self,
        parent: &BTreeInternalPage,
        target_index: usize,
    ) -> Result<(BTreeInternalPage, usize)> {
        let fanout = parent.size() as usize;
        if target_index == 0 {
            return Ok((self.read_internal(parent.child_at(1))?, 1));
        }
        if target_index + 1 == fanout {
            return Ok((
                self.read_internal(parent.child_at(target_index - 1))?,
                target_index - 1,
            ));
        }

        let left = self.read_internal(parent.child_at(target_index - 1))?;
        if left.size() > left.min_size() {
            return Ok((left, target_index - 1));
        }
        let right = self.read_internal(parent.child_at(target_index + 1))?;
        if right.size() > right.min_size() {
            return Ok((right, target_index + 1));
        }
        Ok((left, target_index - 1))
    }

    /// Restores a non-root leaf that fell below min_size, by borrowing
    /// from a sibling or merging into one.
    fn handle_leaf_underflow(&self, mut target: BTreeLeafPage) -> Result<()> {
        let mut parent = self.read_internal(target.parent_page_id())?;
        let target_index = parent.index_of_child(target.page_id()).ok_or_else(|| {
            SiltError::TreeCorrupted(format!("{} missing from its parent", target.page_id()))
        })?;

        let (mut sibling, sibling_index) = self.choose_leaf_sibling(&parent, target_index)?;

        if sibling.size() > sibling.min_size() {
            if sibling_index < target_index {
                // Move the left sibling's last entry over; it becomes the
                // new separator.
                let last = sibling.size() as usize - 1;
                let (key, record_id) = (sibling.key_at(last), sibling.record_at(last));
                sibling.remove_at(last);
                target.insert_by_key(key, record_id, &self.comparator);
                parent.set_key_at(target_index, key);
            } else {
                // Move the right sibling's first entry over; the
                // sibling's new first key becomes the separator.
                let (key, record_id) = (sibling.key_at(0), sibling.record_at(0));
                sibling.remove_at(0);
                target.insert_by_key(key, record_id, &self.comparator);
                parent.set_key_at(sibling_index, sibling.key_at(0));
            }
            self.write_leaf(&sibling)?;
            self.write_leaf(&target)?;
            self.write_internal(&parent)?;
            return Ok(());
        }

        // Merge the right page into the left and drop its parent slot.
        let (mut left, mut right, right_index) = if sibling_index < target_index {
            (sibling, target, target_index)
        } else {
            (target, sibling, sibling_index)
        };

        right.move_all_to(&mut left);
        parent.remove_at(right_index);
        self.write_leaf(&left)?;
        self.bpm.delete_page(right.page_id())?;

        self.finish_parent_underflow(parent, left.page_id())
    }

    /// Restores a non-root internal node that fell below min_size.
    fn handle_internal_underflow(&self, mut target: BTreeInternalPage) -> Result<()> {
        let mut parent = self.read_internal(target.parent_page_id())?;
        let target_index = parent.index_of_child(target.page_id()).ok_or_else(|| {
            SiltError::TreeCorrupted(format!("{} missing from its parent", target.page_id()))
        })?;

        let (mut sibling, sibling_index) = self.choose_internal_sibling(&parent, target_index)?;

        if sibling.size() > sibling.min_size() {
            if sibling_index < target_index {
                // The left sibling's last child rotates in at the front;
                // the old separator drops into the placeholder slot.
                let last = sibling.size() as usize - 1;
                let borrowed_key = sibling.key_at(last);
                let borrowed_child = sibling.child_at(last);
                sibling.remove_at(last);

                target.set_key_at(0, parent.key_at(target_index));
                target.push_front(borrowed_key, borrowed_child);
                parent.set_key_at(target_index, borrowed_key);
                self.set_parent(borrowed_child, target.page_id())?;
            } else {
                // The right sibling's first child comes across under the
                // separator key.
                let borrowed_child = sibling.child_at(0);
                let separator = parent.key_at(sibling_index);
                sibling.remove_at(0);

                target.push_back(separator, borrowed_child);
                parent.set_key_at(sibling_index, sibling.key_at(0));
                self.set_parent(borrowed_child, target.page_id())?;
            }
            self.write_internal(&sibling)?;
            self.write_internal(&target)?;
            self.write_internal(&parent)?;
            return Ok(());
        }

        let (mut left, mut right, right_index) = if sibling_index < target_index {
            (sibling, target, target_index)
        } else {
            (target, sibling, sibling_index)
        };

        // The separator fills the placeholder so the merged key sequence
        // is well formed.
        right.set_key_at(0, parent.key_at(right_index));
        let moved: Vec<PageId> = (0..right.size() as usize)
            .map(|i| right.child_at(i))
            .collect();
        right.move_all_to(&mut left);
        parent.remove_at(right_index);

        self.write_internal(&left)?;
        for child in moved {
            self.set_parent(child, left.page_id())?;
        }
        self.bpm.delete_page(right.page_id())?;

        self.finish_parent_underflow(parent, left.page_id())
    }

    /// After a merge removed a slot from `parent`, rebalance or collapse
    /// it as needed. `merged_child` is the surviving left page.
    fn finish_parent_underflow(
        &self,
        parent: BTreeInternalPage,
        merged_child: PageId,
    ) -> Result<()> {
        if !parent.parent_page_id().is_valid() {
            if parent.size() == 1 {
                // The root has a single child left; that child becomes
                // the new root.
                self.set_parent(merged_child, PageId::INVALID)?;
                self.bpm.delete_page(parent.page_id())?;
                self.set_root_page_id(merged_child);
                self.persist_root()?;
            } else {
                self.write_internal(&parent)?;
            }
            return Ok(());
        }

        if parent.size() < parent.min_size() {
            self.handle_internal_underflow(parent)
        } else {
            self.write_internal(&parent)
        }
    }

    // ------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------

    /// Forward iterator over the whole tree in key order.
    pub fn iter(&self) -> Result<TreeIter<'_, C>> {
        let latch = self.latch.read();

        if self.is_empty() {
            return Ok(TreeIter::new(self, latch, None, 0));
        }
        let leaf_id = self.find_leftmost_leaf_id()?;
        let leaf = self.fetch_leaf_pinned(leaf_id)?;
        Ok(TreeIter::new(self, latch, Some(leaf), 0))
    }

    /// Forward iterator positioned at the first key >= `key`.
    pub fn iter_from(&self, key: &IndexKey) -> Result<TreeIter<'_, C>> {
        let latch = self.latch.read();

        if self.is_empty() {
            return Ok(TreeIter::new(self, latch, None, 0));
        }
        let leaf = self.find_leaf(key)?;
        let index = leaf.lower_bound(key, &self.comparator);
        let leaf = self.fetch_leaf_pinned(leaf.page_id())?;
        Ok(TreeIter::new(self, latch, Some(leaf), index))
    }

    /// Fetches a leaf and keeps its frame pinned for an iterator; the
    /// iterator unpins it when it moves on.
    pub(crate) fn fetch_leaf_pinned(&self, page_id: PageId) -> Result<BTreeLeafPage> {
        let frame = self.bpm.fetch_page(page_id)?;
        let data = frame.read_data();
        match IndexPageType::of_page(&**data) {
            Some(IndexPageType::Leaf) => Ok(BTreeLeafPage::from_bytes(&data)),
            _ => {
                drop(data);
                self.bpm.unpin_page(page_id, false);
                Err(SiltError::TreeCorrupted(format!(
                    "expected leaf at {}",
                    page_id
                )))
            }
        }
    }

    /// Drops an iterator's pin on a leaf.
    pub(crate) fn unpin_leaf(&self, page_id: PageId) {
        self.bpm.unpin_page(page_id, false);
    }
}

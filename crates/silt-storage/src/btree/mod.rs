//! Disk-resident B+ tree index.
//!
//! A classic B+ tree over the buffer pool: fixed-width keys ordered by an
//! injected comparator, record ids as leaf values, leaves chained for
//! forward range scans, and named roots registered on the header page.
//!
//! ```text
//!                 [ internal:  ph|c0  k1|c1  k2|c2 ]
//!                    /            |          \
//!     [ leaf: k,v ... ] -> [ leaf: k,v ... ] -> [ leaf ... ] -> x
//! ```
//!
//! Every node is a single page; node capacities (leaf entries, internal
//! fan-out) are set at tree construction.

pub mod header;
pub mod iterator;
pub mod key;
pub mod page;
pub mod tree;

pub use header::HeaderPage;
pub use iterator::TreeIter;
pub use key::{BytewiseComparator, IndexKey, Int64Comparator, KeyComparator, KEY_SIZE};
pub use page::{BTreeInternalPage, BTreeLeafPage, BTreePageHeader, IndexPageType};
pub use tree::BPlusTree;

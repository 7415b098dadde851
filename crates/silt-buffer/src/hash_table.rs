//! Concurrent extendible hash table.
//!
//! Serves as the buffer pool's page table (page id to frame id) and as a
//! standalone map. Inserts that overflow a bucket split that bucket locally
//! instead of rehashing the whole table: the directory doubles only when
//! the overflowing bucket already discriminates on every directory bit.

use parking_lot::Mutex;
use std::hash::{Hash, Hasher};

/// Hasher whose output is the written integer itself.
///
/// Directory indexing uses the low `global_depth` bits of the hash, and the
/// split sequences of this table are defined in terms of key bit patterns,
/// so integer keys must map to their own bits rather than through a mixing
/// hash.
#[derive(Default)]
struct IdentityHasher {
    state: u64,
}

impl Hasher for IdentityHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut value: u64 = 0;
        for (i, b) in bytes.iter().enumerate().take(8) {
            value |= (*b as u64) << (8 * i);
        }
        self.state ^= value;
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.state ^= value as u64;
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.state ^= value;
    }

    #[inline]
    fn write_i32(&mut self, value: i32) {
        self.state ^= value as u32 as u64;
    }

    #[inline]
    fn write_i64(&mut self, value: i64) {
        self.state ^= value as u64;
    }

    #[inline]
    fn write_usize(&mut self, value: usize) {
        self.state ^= value as u64;
    }
}

/// A bucket holding up to `bucket_size` entries.
struct Bucket<K, V> {
    /// Number of low-order hash bits this bucket discriminates on.
    local_depth: usize,
    /// Linear list of entries; lookups scan it.
    entries: Vec<(K, V)>,
}

/// State behind the table latch.
///
/// Buckets live in an arena and directory slots hold arena indices; two
/// slots alias the same bucket whenever that bucket's local depth is less
/// than the global depth.
struct TableInner<K, V> {
    /// Number of low-order hash bits the directory indexes by.
    global_depth: usize,
    /// Directory of arena indices; length is always `1 << global_depth`.
    directory: Vec<usize>,
    /// Bucket arena. `None` marks slots released by a split.
    buckets: Vec<Option<Bucket<K, V>>>,
    /// Reusable arena slots.
    free_slots: Vec<usize>,
    /// Number of live buckets.
    num_buckets: usize,
}

/// Outcome of the latched fast path of an insert.
enum InsertOutcome {
    Done,
    Split { slot: usize, local_depth: usize },
}

/// Concurrent extendible hash table with a single exclusive latch.
pub struct ExtendibleHashTable<K, V> {
    /// Maximum number of entries per bucket.
    bucket_size: usize,
    /// Directory, arena, and depths behind the table latch.
    inner: Mutex<TableInner<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq,
{
    /// Creates a table with one empty bucket and global depth 0.
    pub fn new(bucket_size: usize) -> Self {
        assert!(bucket_size >= 1, "bucket size must be at least 1");
        Self {
            bucket_size,
            inner: Mutex::new(TableInner {
                global_depth: 0,
                directory: vec![0],
                buckets: vec![Some(Bucket {
                    local_depth: 0,
                    entries: Vec::new(),
                })],
                free_slots: Vec::new(),
                num_buckets: 1,
            }),
        }
    }

    /// Directory index for a key at the given global depth.
    #[inline]
    fn index_of(key: &K, global_depth: usize) -> usize {
        let mut hasher = IdentityHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & ((1usize << global_depth) - 1)
    }

    /// Allocates an empty bucket in the arena and returns its slot.
    fn alloc_bucket(inner: &mut TableInner<K, V>, local_depth: usize) -> usize {
        let bucket = Bucket {
            local_depth,
            entries: Vec::new(),
        };
        if let Some(slot) = inner.free_slots.pop() {
            inner.buckets[slot] = Some(bucket);
            slot
        } else {
            inner.buckets.push(Some(bucket));
            inner.buckets.len() - 1
        }
    }

    /// Looks up a key and returns a copy of its value.
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let inner = self.inner.lock();
        let slot = inner.directory[Self::index_of(key, inner.global_depth)];
        let bucket = inner.buckets[slot].as_ref().unwrap();
        bucket
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Returns true if the key is present.
    pub fn contains(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        let slot = inner.directory[Self::index_of(key, inner.global_depth)];
        let bucket = inner.buckets[slot].as_ref().unwrap();
        bucket.entries.iter().any(|(k, _)| k == key)
    }

    /// Removes a key. Returns true if it was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let slot = inner.directory[Self::index_of(key, inner.global_depth)];
        let bucket = inner.buckets[slot].as_mut().unwrap();
        if let Some(pos) = bucket.entries.iter().position(|(k, _)| k == key) {
            bucket.entries.remove(pos);
            true
        } else {
            false
        }
    }

    /// Inserts a key-value pair, overwriting any existing value.
    ///
    /// A full bucket splits into two buckets of local depth + 1, the
    /// directory doubling first when the bucket's local depth already
    /// equals the global depth. The insert then retries; a skewed
    /// redistribution can make one bucket split several times in a row.
    pub fn insert(&self, key: K, value: V) {
        let inner = &mut *self.inner.lock();
        let mut value = Some(value);

        loop {
            let idx = Self::index_of(&key, inner.global_depth);
            let slot = inner.directory[idx];

            let outcome = {
                let bucket = inner.buckets[slot].as_mut().unwrap();
                if let Some(entry) = bucket.entries.iter_mut().find(|(k, _)| *k == key) {
                    entry.1 = value.take().unwrap();
                    InsertOutcome::Done
                } else if bucket.entries.len() < self.bucket_size {
                    bucket.entries.push((key, value.take().unwrap()));
                    return;
                } else {
                    InsertOutcome::Split {
                        slot,
                        local_depth: bucket.local_depth,
                    }
                }
            };

            let (old_slot, local_depth) = match outcome {
                InsertOutcome::Done => return,
                InsertOutcome::Split { slot, local_depth } => (slot, local_depth),
            };

            if local_depth == inner.global_depth {
                // Grow: each new slot initially aliases its lower twin.
                inner.global_depth += 1;
                let old_len = inner.directory.len();
                for i in 0..old_len {
                    let twin = inner.directory[i];
                    inner.directory.push(twin);
                }
            }

            let low = Self::alloc_bucket(inner, local_depth + 1);
            let high = Self::alloc_bucket(inner, local_depth + 1);

            // Rewire every directory slot that aliased the old bucket; the
            // bit just above the old local depth picks the side.
            for i in 0..inner.directory.len() {
                if inner.directory[i] == old_slot {
                    inner.directory[i] = if (i >> local_depth) & 1 == 0 { low } else { high };
                }
            }

            let old_bucket = inner.buckets[old_slot].take().unwrap();
            inner.free_slots.push(old_slot);
            inner.num_buckets += 1; // one removed, two added

            for (k, v) in old_bucket.entries {
                let j = Self::index_of(&k, inner.global_depth);
                let target = inner.directory[j];
                inner.buckets[target].as_mut().unwrap().entries.push((k, v));
            }
            // Retry; the target bucket may still be full if the
            // redistribution was one-sided.
        }
    }

    /// Returns the global depth of the directory.
    pub fn global_depth(&self) -> usize {
        self.inner.lock().global_depth
    }

    /// Returns the local depth of the bucket at the given directory index.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock();
        let slot = inner.directory[dir_index];
        inner.buckets[slot].as_ref().unwrap().local_depth
    }

    /// Returns the number of live buckets.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().num_buckets
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .buckets
            .iter()
            .flatten()
            .map(|b| b.entries.len())
            .sum()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls the provided function for every entry.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let inner = self.inner.lock();
        for bucket in inner.buckets.iter().flatten() {
            for (k, v) in &bucket.entries {
                f(k, v);
            }
        }
    }
}

//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Trait for page replacement algorithms.
pub trait Replacer: Send + Sync {
    /// Records that the given frame was accessed.
    fn record_access(&self, frame_id: FrameId);

    /// Marks a frame as evictable or pinned. No-op for unknown frames.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Selects and removes the victim frame with the largest
    /// backward-K-distance.
    ///
    /// Returns None if no frames are evictable.
    fn evict(&self) -> Option<FrameId>;

    /// Removes a frame and all of its access history.
    ///
    /// The frame must be evictable; removing a pinned frame is a caller
    /// bug. Unknown frames are a no-op.
    fn remove(&self, frame_id: FrameId);

    /// Returns the number of evictable frames.
    fn size(&self) -> usize;
}

/// Per-frame access record.
struct LruKNode {
    /// Last K access timestamps, oldest first.
    history: VecDeque<u64>,
    /// Whether the frame may currently be evicted.
    evictable: bool,
}

/// Internal state protected by the replacer latch.
struct LruKInner {
    /// Access records for every tracked frame.
    nodes: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than K accesses, ordered by first-access time.
    /// These have infinite backward-K-distance and are evicted first.
    history_queue: BTreeSet<(u64, FrameId)>,
    /// Frames with at least K accesses, ordered by the oldest retained
    /// timestamp (equivalently, by backward-K-distance, largest first).
    cache_queue: BTreeSet<(u64, FrameId)>,
    /// Monotonic logical clock; wall time is never consulted.
    clock: u64,
    /// Number of frames currently marked evictable.
    evictable_count: usize,
}

/// LRU-K replacement policy.
///
/// Evicts the frame whose K-th most recent access is furthest in the past.
/// Frames with fewer than K recorded accesses have infinite backward
/// distance and are evicted first, oldest first access winning ties.
/// Timestamps come from a logical clock and are unique, so the two ordered
/// sets give a total eviction order.
pub struct LruKReplacer {
    /// Number of frames this replacer tracks.
    num_frames: usize,
    /// The K in LRU-K.
    k: usize,
    /// Internal state behind a single exclusive latch.
    inner: Mutex<LruKInner>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer for `num_frames` frames.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            num_frames,
            k,
            inner: Mutex::new(LruKInner {
                nodes: HashMap::new(),
                history_queue: BTreeSet::new(),
                cache_queue: BTreeSet::new(),
                clock: 0,
                evictable_count: 0,
            }),
        }
    }

    /// Returns the total capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.num_frames
    }

    /// Returns the K parameter.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }
}

impl Replacer for LruKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        assert!(
            (frame_id.0 as usize) < self.num_frames,
            "frame id {} out of range",
            frame_id
        );

        let inner = &mut *self.inner.lock();
        inner.clock += 1;
        let now = inner.clock;

        match inner.nodes.entry(frame_id) {
            Entry::Vacant(slot) => {
                let mut history = VecDeque::with_capacity(self.k);
                history.push_back(now);
                slot.insert(LruKNode {
                    history,
                    evictable: false,
                });
                if self.k == 1 {
                    inner.cache_queue.insert((now, frame_id));
                } else {
                    inner.history_queue.insert((now, frame_id));
                }
            }
            Entry::Occupied(mut slot) => {
                let node = slot.get_mut();
                if node.history.len() < self.k {
                    // First-access ordering key is stable until the frame
                    // graduates to the cache queue.
                    let first = *node.history.front().unwrap();
                    node.history.push_back(now);
                    if node.history.len() == self.k {
                        inner.history_queue.remove(&(first, frame_id));
                        inner.cache_queue.insert((first, frame_id));
                    }
                } else {
                    // Slide the K-window: drop the oldest retained
                    // timestamp and reposition in the cache queue.
                    let old_oldest = node.history.pop_front().unwrap();
                    node.history.push_back(now);
                    let new_oldest = *node.history.front().unwrap();
                    inner.cache_queue.remove(&(old_oldest, frame_id));
                    inner.cache_queue.insert((new_oldest, frame_id));
                }
            }
        }
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let inner = &mut *self.inner.lock();
        let Some(node) = inner.nodes.get_mut(&frame_id) else {
            return;
        };
        if node.evictable == evictable {
            return;
        }
        node.evictable = evictable;
        if evictable {
            inner.evictable_count += 1;
        } else {
            inner.evictable_count -= 1;
        }
    }

    fn evict(&self) -> Option<FrameId> {
        let inner = &mut *self.inner.lock();

        // History frames have infinite backward distance; scan them in
        // first-access order before consulting the cache queue.
        let found = inner
            .history_queue
            .iter()
            .copied()
            .find(|(_, f)| inner.nodes[f].evictable)
            .map(|entry| (entry, false))
            .or_else(|| {
                inner
                    .cache_queue
                    .iter()
                    .copied()
                    .find(|(_, f)| inner.nodes[f].evictable)
                    .map(|entry| (entry, true))
            });

        let ((key, frame_id), in_cache) = found?;
        if in_cache {
            inner.cache_queue.remove(&(key, frame_id));
        } else {
            inner.history_queue.remove(&(key, frame_id));
        }
        inner.nodes.remove(&frame_id);
        inner.evictable_count -= 1;
        Some(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let inner = &mut *self.inner.lock();
        let Some(node) = inner.nodes.get(&frame_id) else {
            return;
        };
        assert!(
            node.evictable,
            "remove on a non-evictable frame {}",
            frame_id
        );
        let key = *node.history.front().unwrap();
        if node.history.len() < self.k {
            inner.history_queue.remove(&(key, frame_id));
        } else {
            inner.cache_queue.remove(&(key, frame_id));
        }
        inner.nodes.remove(&frame_id);
        inner.evictable_count -= 1;
    }

    fn size(&self) -> usize {
        self.inner.lock().evictable_count
    }
}

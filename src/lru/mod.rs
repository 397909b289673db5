//! Bounded, access-order LRU cache.
//!
//! ## How it works
//!
//! ```text
//! MRU                                   LRU
//! head → [c] ⇄ [a] ⇄ [b] ⇄ ... → tail
//! ```
//!
//! Entries live in a `Vec` slab; a `HashMap<K, usize>` maps keys to slab
//! indices so `get`/`put`/`touch` are all O(1). The slab doubles as an
//! intrusive doubly linked list (`prev`/`next` indices) ordered from
//! most- to least-recently-used; eviction always removes the tail.
//!
//! This module has no locking of its own — [`LruCache`] is a plain,
//! single-threaded data structure. [`SharedLruCache`] wraps it behind a
//! mutex for cross-thread use, and [`Memoizer`] ties it to a
//! [`Sav`](crate::sav::Sav) per key so concurrent callers racing on the
//! same miss share one computation instead of each re-running it.

mod memoizer;
mod shared;

pub use memoizer::Memoizer;
pub use shared::SharedLruCache;

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;

const NIL: usize = usize::MAX;

struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// A bounded-capacity cache with least-recently-used eviction.
///
/// All operations are total — there's no error path. Capacity is
/// fixed at construction and is always `>= 1`.
pub struct LruCache<K, V> {
    capacity: NonZeroUsize,
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    head: usize, // most-recently-used
    tail: usize, // least-recently-used
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            index: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn size(&self) -> usize {
        self.index.len()
    }

    /// Returns a reference to the value for `key`, marking it
    /// most-recently-used. Returns `None` without disturbing order if
    /// absent.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        Some(&self.nodes[idx].value)
    }

    /// Inserts or overwrites `key`; evicts the least-recently-used entry
    /// first if the cache is full and `key` is new. Marks `key`
    /// most-recently-used either way.
    pub fn put(&mut self, key: K, value: V) {
        if let Some(&idx) = self.index.get(&key) {
            self.nodes[idx].value = value;
            self.move_to_front(idx);
            return;
        }

        if self.index.len() == self.capacity.get() {
            self.evict_tail();
        }

        let idx = self.push_node(key.clone(), value);
        self.index.insert(key, idx);
        self.attach_front(idx);
    }

    /// Equivalent to [`put`](Self::put): always writes the value and bumps
    /// recency, whether or not `key` was already present. Kept distinct
    /// from `put` to make the "always touches recency" guarantee explicit
    /// at call sites.
    pub fn touch(&mut self, key: K, value: V) {
        self.put(key, value);
    }

    fn push_node(&mut self, key: K, value: V) -> usize {
        let node = Node {
            key,
            value,
            prev: NIL,
            next: NIL,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn attach_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    fn evict_tail(&mut self) {
        let idx = self.tail;
        debug_assert_ne!(idx, NIL);
        self.detach(idx);
        self.index.remove(&self.nodes[idx].key);
        self.free.push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache<K: Eq + Hash + Clone, V>(cap: usize) -> LruCache<K, V> {
        LruCache::new(NonZeroUsize::new(cap).unwrap())
    }

    /// `LRU(cap=3): put a=1; put b=2; put c=3; get a; put d=4` → {a, c, d}; b evicted.
    #[test]
    fn scenario_get_bumps_recency() {
        let mut c = cache(3);
        c.put("a", 1);
        c.put("b", 2);
        c.put("c", 3);
        assert_eq!(c.get(&"a"), Some(&1));
        c.put("d", 4);

        assert_eq!(c.size(), 3);
        assert_eq!(c.get(&"b"), None);
        assert_eq!(c.get(&"a"), Some(&1));
        assert_eq!(c.get(&"c"), Some(&3));
        assert_eq!(c.get(&"d"), Some(&4));
    }

    /// `LRU(cap=3): put a=1; put b=2; put c=3; touch a=11; put d=4` → {a=11, c=3, d=4}; b evicted.
    #[test]
    fn scenario_touch_overwrites_and_bumps() {
        let mut c = cache(3);
        c.put("a", 1);
        c.put("b", 2);
        c.put("c", 3);
        c.touch("a", 11);
        c.put("d", 4);

        assert_eq!(c.get(&"b"), None);
        assert_eq!(c.get(&"a"), Some(&11));
        assert_eq!(c.get(&"c"), Some(&3));
        assert_eq!(c.get(&"d"), Some(&4));
    }

    #[test]
    fn overwrite_counts_as_use() {
        let mut c = cache(2);
        c.put("a", 1);
        c.put("b", 2);
        c.put("a", 11); // overwrite: a becomes MRU
        c.put("c", 3); // evicts b, not a
        assert_eq!(c.get(&"a"), Some(&11));
        assert_eq!(c.get(&"b"), None);
        assert_eq!(c.get(&"c"), Some(&3));
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut c = cache(4);
        for i in 0..100 {
            c.put(i, i * 2);
            assert!(c.size() <= c.capacity());
        }
    }

    #[test]
    fn single_capacity_always_holds_latest() {
        let mut c = cache(1);
        c.put("a", 1);
        c.put("b", 2);
        assert_eq!(c.get(&"a"), None);
        assert_eq!(c.get(&"b"), Some(&2));
    }
}

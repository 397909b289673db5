use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use super::LruCache;

/// A [`LruCache`] guarded by a single mutex for cross-thread use.
///
/// `get` returns an owned clone rather than a reference, since the lock
/// can't be held past the call.
pub struct SharedLruCache<K, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> SharedLruCache<K, V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().unwrap().put(key, value);
    }

    pub fn touch(&self, key: K, value: V) {
        self.inner.lock().unwrap().touch(key, value);
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().size()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity()
    }
}

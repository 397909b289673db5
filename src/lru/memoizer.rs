//! Ties a [`SharedLruCache`] to a [`Sav`] per in-flight key, so concurrent
//! callers racing on the same cache miss share one computation instead of
//! each repeating it — the "bounded LRU cache used to memoize pure
//! computations" use case named in the purpose statement but not spelled
//! out by the component table.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::sav::Sav;

use super::SharedLruCache;

/// Memoizes `compute` behind a bounded LRU cache, keyed by `K`, with
/// errors of type `E`.
///
/// A cache hit returns immediately. A cache miss installs a fresh `Sav`
/// for the key *before* running `compute`, so any other caller observing
/// the same miss binds to that in-flight `Sav` rather than recomputing.
pub struct Memoizer<K, V, E> {
    cache: SharedLruCache<K, V>,
    in_flight: Mutex<std::collections::HashMap<K, Sav<V, E>>>,
}

impl<K, V, E> Memoizer<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + PartialEq + 'static,
    E: Clone + Send + 'static,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: SharedLruCache::new(capacity),
            in_flight: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, or runs `compute` once (across
    /// all concurrent callers for that key) and caches its success.
    pub fn get_or_compute(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, crate::error::ReadError<E>> {
        if let Some(v) = self.cache.get(&key) {
            return Ok(v);
        }

        let (sav, is_leader) = {
            let mut flight = self.in_flight.lock().unwrap();
            if let Some(sav) = flight.get(&key) {
                (sav.clone(), false)
            } else {
                let sav = Sav::new();
                flight.insert(key.clone(), sav.clone());
                (sav, true)
            }
        };

        if is_leader {
            let result = compute();
            match &result {
                Ok(v) => {
                    self.cache.put(key.clone(), v.clone());
                    sav.bind(v.clone()).ok();
                }
                Err(e) => {
                    sav.bind_error(e.clone()).ok();
                }
            }
            self.in_flight.lock().unwrap().remove(&key);
            result.map_err(crate::error::ReadError)
        } else {
            sav.read()
        }
    }

    pub fn size(&self) -> usize {
        self.cache.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn concurrent_miss_computes_once() {
        let memo: Arc<Memoizer<&'static str, i32, String>> =
            Arc::new(Memoizer::new(NonZeroUsize::new(4).unwrap()));
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = memo.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    memo.get_or_compute("k", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(20));
                        Ok::<_, String>(99)
                    })
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), Ok(99));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.get_or_compute("k", || Ok::<_, String>(0)), Ok(99));
    }

    #[test]
    fn propagates_compute_error() {
        let memo: Memoizer<&'static str, i32, String> = Memoizer::new(NonZeroUsize::new(4).unwrap());
        let result = memo.get_or_compute("k", || Err("boom".to_string()));
        assert_eq!(result.unwrap_err().0, "boom".to_string());
    }
}

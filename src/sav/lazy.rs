//! Lazy single-assignment variable: the initializer runs at most once, on
//! first observation.

use std::sync::Mutex;

use super::{Sav, ThenOutcome};

/// What a [`LazySav`]'s initializer produces.
pub enum LazyOutcome<T, E> {
    Value(T),
    Error(E),
    /// Adopt another SAV's eventual outcome (flattening).
    Chained(Sav<T, E>),
}

type Initializer<T, E> = Box<dyn FnOnce() -> LazyOutcome<T, E> + Send>;

/// A [`Sav`] whose value is computed lazily, exactly once, at first
/// observation.
///
/// `poll()` does *not* count as an observation, since `poll` must stay
/// non-blocking and side-effect-free for [`crate::select::Select`]'s
/// safety contract. `read`, `try_read`, `when_bound` and `then` all
/// trigger it.
pub struct LazySav<T, E> {
    inner: Sav<T, E>,
    init: Mutex<Option<Initializer<T, E>>>,
}

impl<T: Clone + Send + PartialEq + 'static, E: Clone + Send + 'static> LazySav<T, E> {
    pub fn new(init: impl FnOnce() -> LazyOutcome<T, E> + Send + 'static) -> Self {
        Self {
            inner: Sav::new(),
            init: Mutex::new(Some(Box::new(init))),
        }
    }

    /// Runs the initializer if it hasn't run yet. Safe to call from
    /// multiple threads concurrently: only the thread that wins the race
    /// to take the initializer out of the `Mutex` runs it.
    fn trigger(&self) {
        let init = self.init.lock().unwrap().take();
        let Some(init) = init else { return };
        match init() {
            LazyOutcome::Value(v) => {
                self.inner.bind(v).ok();
            }
            LazyOutcome::Error(e) => {
                self.inner.bind_error(e).ok();
            }
            LazyOutcome::Chained(upstream) => {
                let target = self.inner.clone();
                upstream.when_bound(move |res| match res {
                    Ok(v) => {
                        target.bind(v).ok();
                    }
                    Err(e) => {
                        target.bind_error(e).ok();
                    }
                });
            }
        }
    }

    pub fn read(&self) -> Result<T, crate::error::ReadError<E>> {
        self.trigger();
        self.inner.read()
    }

    pub fn try_read(
        &self,
        deadline: std::time::Instant,
    ) -> Result<Option<T>, crate::error::TryReadError<E>> {
        self.trigger();
        self.inner.try_read(deadline)
    }

    /// Non-triggering peek; matches `poll`'s non-blocking, side-effect-free
    /// contract even on a lazy cell.
    pub fn poll(&self) -> Option<T> {
        self.inner.poll()
    }

    pub fn when_bound(&self, h: impl FnOnce(Result<T, E>) + Send + 'static) {
        self.trigger();
        self.inner.when_bound(h);
    }

    /// As [`Sav::then`], but triggers the initializer first — spec.md
    /// §4.7 lists `then` among the operations that must.
    pub fn then<U>(
        &self,
        on_value: impl FnOnce(T) -> ThenOutcome<U, E> + Send + 'static,
    ) -> Sav<U, E>
    where
        U: Clone + Send + PartialEq + 'static,
    {
        self.trigger();
        self.inner.then(on_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn initializer_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let lazy: LazySav<i32, String> = LazySav::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            LazyOutcome::Value(42)
        });

        assert_eq!(lazy.read(), Ok(42));
        assert_eq!(lazy.read(), Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn poll_does_not_trigger() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let lazy: LazySav<i32, String> = LazySav::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            LazyOutcome::Value(1)
        });
        assert_eq!(lazy.poll(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn then_triggers_the_initializer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let lazy: LazySav<i32, String> = LazySav::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            LazyOutcome::Value(21)
        });
        let doubled = lazy.then(|x| ThenOutcome::Value(x * 2));
        assert_eq!(doubled.read(), Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn flattens_chained_sav() {
        let upstream: Sav<i32, String> = Sav::new();
        let upstream_clone = upstream.clone();
        let lazy: Arc<LazySav<i32, String>> =
            Arc::new(LazySav::new(move || LazyOutcome::Chained(upstream_clone)));
        let lazy2 = lazy.clone();
        let reader = thread::spawn(move || lazy2.read());
        thread::sleep(std::time::Duration::from_millis(20));
        upstream.bind(7).unwrap();
        assert_eq!(reader.join().unwrap(), Ok(7));
    }
}

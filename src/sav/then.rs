//! `then`/`then_catch` chaining and `when_all_bound`.

use std::sync::Arc;

use super::Sav;

/// What a `then`/`then_catch` stage hands back to bind the resulting SAV.
pub enum ThenOutcome<T, E> {
    /// Bind the downstream SAV to this value.
    Value(T),
    /// Fail the downstream SAV with this error.
    Error(E),
    /// Adopt another SAV's eventual outcome (flattening).
    Chained(Sav<T, E>),
}

fn settle<U, E>(target: &Sav<U, E>, outcome: ThenOutcome<U, E>)
where
    U: Clone + Send + PartialEq + 'static,
    E: Clone + Send + 'static,
{
    match outcome {
        ThenOutcome::Value(v) => {
            target.bind(v).ok();
        }
        ThenOutcome::Error(e) => {
            target.bind_error(e).ok();
        }
        ThenOutcome::Chained(upstream) => {
            let target = target.clone();
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

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Sav<T, E> {
    /// Runs `on_value` when this SAV binds; a `Failed` outcome is
    /// forwarded unchanged to the returned SAV without running `on_value`.
    pub fn then<U>(
        &self,
        on_value: impl FnOnce(T) -> ThenOutcome<U, E> + Send + 'static,
    ) -> Sav<U, E>
    where
        U: Clone + Send + PartialEq + 'static,
    {
        let target: Sav<U, E> = Sav::with_scheduler(self.shared.scheduler.clone());
        let out = target.clone();
        self.when_bound(move |res| match res {
            Ok(v) => settle(&out, on_value(v)),
            Err(e) => {
                out.bind_error(e).ok();
            }
        });
        target
    }

    /// As [`then`](Self::then), but also handles `Failed`: if `on_error`
    /// itself raises (returns `ThenOutcome::Error`), the resulting SAV
    /// fails with that new error.
    pub fn then_catch<U>(
        &self,
        on_value: impl FnOnce(T) -> ThenOutcome<U, E> + Send + 'static,
        on_error: impl FnOnce(E) -> ThenOutcome<U, E> + Send + 'static,
    ) -> Sav<U, E>
    where
        U: Clone + Send + PartialEq + 'static,
    {
        let target: Sav<U, E> = Sav::with_scheduler(self.shared.scheduler.clone());
        let out = target.clone();
        self.when_bound(move |res| match res {
            Ok(v) => settle(&out, on_value(v)),
            Err(e) => settle(&out, on_error(e)),
        });
        target
    }
}

/// `whenAllBound`: binds once every input SAV is bound, to
/// `combiner(values)`; fails with the first error observed across inputs
/// (registration order wins on ties — the first input in `savs` whose
/// failure is observed settles the result).
pub fn when_all_bound<T, E, U>(
    savs: Vec<Sav<T, E>>,
    combiner: impl FnOnce(Vec<T>) -> U + Send + 'static,
) -> Sav<U, E>
where
    T: Clone + Send + PartialEq + 'static,
    E: Clone + Send + PartialEq + 'static,
    U: Clone + Send + PartialEq + 'static,
{
    let scheduler = savs
        .first()
        .map(|s| s.shared.scheduler.clone())
        .unwrap_or_else(crate::scheduler::default_scheduler);
    let result: Sav<U, E> = Sav::with_scheduler(scheduler);

    if savs.is_empty() {
        let values = Vec::new();
        result.bind(combiner(values)).ok();
        return result;
    }

    struct Shared<T, E, U> {
        n: usize,
        remaining: std::sync::Mutex<(usize, Vec<Option<T>>, Option<(usize, E)>)>,
        result: Sav<U, E>,
        combiner: std::sync::Mutex<Option<Box<dyn FnOnce(Vec<T>) -> U + Send>>>,
    }

    let shared = Arc::new(Shared {
        n: savs.len(),
        remaining: std::sync::Mutex::new((savs.len(), vec![None; savs.len()], None)),
        result: result.clone(),
        combiner: std::sync::Mutex::new(Some(Box::new(combiner))),
    });

    for (idx, sav) in savs.into_iter().enumerate() {
        let shared = shared.clone();
        sav.when_bound(move |res| {
            let mut guard = shared.remaining.lock().unwrap();
            match res {
                Ok(v) => {
                    guard.1[idx] = Some(v);
                    guard.0 -= 1;
                }
                Err(e) => {
                    if guard.2.is_none() {
                        guard.2 = Some((idx, e));
                    }
                }
            }
            let done = guard.0 == 0 || guard.2.is_some();
            if !done {
                return;
            }
            // Only the thread that observes completion first should settle
            // the result; take the combiner out so later callers are no-ops.
            let combiner = shared.combiner.lock().unwrap().take();
            let error = guard.2.clone();
            let values = std::mem::take(&mut guard.1);
            drop(guard);

            if let Some((_, e)) = error {
                shared.result.bind_error(e).ok();
                return;
            }
            if let Some(combiner) = combiner {
                let values: Vec<T> = values.into_iter().map(|v| v.unwrap()).collect();
                debug_assert_eq!(values.len(), shared.n);
                shared.result.bind(combiner(values)).ok();
            }
        });
    }

    result
}

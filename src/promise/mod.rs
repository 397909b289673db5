//! `parallelMap`/`parallelFilter`/`parallelFind`/`parallelAll`/`parallelAny`:
//! apply a function concurrently over a finite sequence via the scheduler,
//! collect results, and preserve every per-element failure rather than
//! reporting only the first.
//!
//! These are additive sugar over [`crate::sav::Sav`] and
//! [`crate::sav::when_all_bound`], not a new primitive: each function
//! dispatches one scheduler task per element and combines the resulting
//! SAVs, the same pattern `when_all_bound` already uses internally.

use std::fmt;
use std::sync::Arc;

use crate::sav::Sav;
use crate::scheduler::Scheduler;

/// Every per-element failure from a `parallel*` call, in input order.
#[derive(Debug, Clone)]
pub struct CompoundError<E> {
    pub failures: Vec<(usize, E)>,
}

impl<E: fmt::Display> fmt::Display for CompoundError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} element(s) failed", self.failures.len())?;
        for (idx, e) in &self.failures {
            write!(f, "; [{idx}]: {e}")?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CompoundError<E> {}

/// Runs `f` concurrently over every element of `items` via `scheduler`,
/// and binds the returned SAV to the results in input order once every
/// task has completed. If one or more elements fail, the SAV fails with
/// a [`CompoundError`] listing every failure (not just the first) — the
/// opposite short-circuit policy from `when_all_bound`, since here every
/// element is independent work the caller likely wants full visibility
/// into, rather than a combinator chain that naturally stops at the first
/// broken link.
pub fn parallel_map<T, U, E>(
    items: Vec<T>,
    scheduler: Arc<dyn Scheduler>,
    f: impl Fn(T) -> Result<U, E> + Send + Sync + 'static,
) -> Sav<Vec<U>, CompoundError<E>>
where
    T: Send + 'static,
    U: Clone + Send + PartialEq + 'static,
    E: Clone + Send + 'static,
{
    let result: Sav<Vec<U>, CompoundError<E>> = Sav::with_scheduler(scheduler.clone());
    let n = items.len();
    if n == 0 {
        result.bind(Vec::new()).ok();
        return result;
    }

    struct Shared<U, E> {
        remaining: std::sync::Mutex<(usize, Vec<Option<U>>, Vec<(usize, E)>)>,
    }
    let shared = Arc::new(Shared {
        remaining: std::sync::Mutex::new((n, vec![None; n], Vec::new())),
    });
    let f = Arc::new(f);

    for (idx, item) in items.into_iter().enumerate() {
        let shared = shared.clone();
        let f = f.clone();
        let result = result.clone();
        scheduler.submit(Box::new(move || {
            let outcome = f(item);
            let mut guard = shared.remaining.lock().unwrap();
            match outcome {
                Ok(v) => guard.1[idx] = Some(v),
                Err(e) => guard.2.push((idx, e)),
            }
            guard.0 -= 1;
            if guard.0 > 0 {
                return;
            }
            let (_, values, mut failures) = std::mem::replace(&mut *guard, (0, Vec::new(), Vec::new()));
            drop(guard);
            if failures.is_empty() {
                let values: Vec<U> = values.into_iter().map(|v| v.unwrap()).collect();
                result.bind(values).ok();
            } else {
                failures.sort_by_key(|(idx, _)| *idx);
                result.bind_error(CompoundError { failures }).ok();
            }
        }));
    }

    result
}

/// Keeps, in input order, every element for which `pred` returns `Ok(true)`.
pub fn parallel_filter<T, E>(
    items: Vec<T>,
    scheduler: Arc<dyn Scheduler>,
    pred: impl Fn(&T) -> Result<bool, E> + Send + Sync + 'static,
) -> Sav<Vec<T>, CompoundError<E>>
where
    T: Clone + Send + PartialEq + 'static,
    E: Clone + Send + 'static,
{
    let tagged = parallel_map(items.clone(), scheduler, move |item| {
        pred(&item).map(|keep| keep)
    });
    let out: Sav<Vec<T>, CompoundError<E>> = Sav::new();
    let out_target = out.clone();
    tagged.when_bound(move |res| match res {
        Ok(flags) => {
            let kept: Vec<T> = items
                .into_iter()
                .zip(flags)
                .filter_map(|(item, keep)| keep.then_some(item))
                .collect();
            out_target.bind(kept).ok();
        }
        Err(e) => {
            out_target.bind_error(e).ok();
        }
    });
    out
}

/// The first element (by input order) for which `pred` returns `Ok(true)`,
/// or `None` if no element matches.
pub fn parallel_find<T, E>(
    items: Vec<T>,
    scheduler: Arc<dyn Scheduler>,
    pred: impl Fn(&T) -> Result<bool, E> + Send + Sync + 'static,
) -> Sav<Option<T>, CompoundError<E>>
where
    T: Clone + Send + PartialEq + 'static,
    E: Clone + Send + 'static,
{
    let filtered = parallel_filter(items, scheduler, pred);
    let out: Sav<Option<T>, CompoundError<E>> = Sav::new();
    let out_target = out.clone();
    filtered.when_bound(move |res| match res {
        Ok(mut kept) => {
            out_target.bind(if kept.is_empty() { None } else { Some(kept.remove(0)) }).ok();
        }
        Err(e) => {
            out_target.bind_error(e).ok();
        }
    });
    out
}

/// Whether every element satisfies `pred`.
pub fn parallel_all<T, E>(
    items: Vec<T>,
    scheduler: Arc<dyn Scheduler>,
    pred: impl Fn(&T) -> Result<bool, E> + Send + Sync + 'static,
) -> Sav<bool, CompoundError<E>>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    let flags = parallel_map(items, scheduler, move |item| pred(&item));
    let out: Sav<bool, CompoundError<E>> = Sav::new();
    let out_target = out.clone();
    flags.when_bound(move |res| match res {
        Ok(flags) => {
            out_target.bind(flags.into_iter().all(|b| b)).ok();
        }
        Err(e) => {
            out_target.bind_error(e).ok();
        }
    });
    out
}

/// Whether any element satisfies `pred`.
pub fn parallel_any<T, E>(
    items: Vec<T>,
    scheduler: Arc<dyn Scheduler>,
    pred: impl Fn(&T) -> Result<bool, E> + Send + Sync + 'static,
) -> Sav<bool, CompoundError<E>>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    let flags = parallel_map(items, scheduler, move |item| pred(&item));
    let out: Sav<bool, CompoundError<E>> = Sav::new();
    let out_target = out.clone();
    flags.when_bound(move |res| match res {
        Ok(flags) => {
            out_target.bind(flags.into_iter().any(|b| b)).ok();
        }
        Err(e) => {
            out_target.bind_error(e).ok();
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ThreadScheduler;
    use std::time::{Duration, Instant};

    fn scheduler() -> Arc<dyn Scheduler> {
        Arc::new(ThreadScheduler)
    }

    #[test]
    fn parallel_map_collects_in_input_order() {
        let out = parallel_map(vec![1, 2, 3, 4], scheduler(), |x| Ok::<_, String>(x * x));
        assert_eq!(out.read(), Ok(vec![1, 4, 9, 16]));
    }

    #[test]
    fn parallel_map_reports_every_failure() {
        let out = parallel_map(vec![1, 2, 3, 4], scheduler(), |x| {
            if x % 2 == 0 {
                Err(format!("even: {x}"))
            } else {
                Ok(x)
            }
        });
        let err = out.read().unwrap_err().0;
        assert_eq!(err.failures, vec![(1, "even: 2".to_string()), (3, "even: 4".to_string())]);
    }

    #[test]
    fn parallel_filter_keeps_matching_in_order() {
        let out = parallel_filter(vec![1, 2, 3, 4, 5], scheduler(), |x| Ok::<_, String>(x % 2 == 0));
        assert_eq!(out.read(), Ok(vec![2, 4]));
    }

    #[test]
    fn parallel_find_returns_first_match() {
        let out = parallel_find(vec![1, 3, 4, 5, 6], scheduler(), |x| Ok::<_, String>(x % 2 == 0));
        assert_eq!(out.read(), Ok(Some(4)));
    }

    #[test]
    fn parallel_find_none_when_nothing_matches() {
        let out = parallel_find(vec![1, 3, 5], scheduler(), |x| Ok::<_, String>(x % 2 == 0));
        assert_eq!(out.read(), Ok(None));
    }

    #[test]
    fn parallel_all_and_any() {
        let all = parallel_all(vec![2, 4, 6], scheduler(), |x| Ok::<_, String>(x % 2 == 0));
        assert_eq!(all.read(), Ok(true));
        let any = parallel_any(vec![1, 3, 4], scheduler(), |x| Ok::<_, String>(x % 2 == 0));
        assert_eq!(any.read(), Ok(true));
        let none = parallel_any(vec![1, 3, 5], scheduler(), |x| Ok::<_, String>(x % 2 == 0));
        assert_eq!(none.read(), Ok(false));
    }

    #[test]
    fn empty_input_binds_immediately() {
        let out: Sav<Vec<i32>, CompoundError<String>> =
            parallel_map(Vec::new(), scheduler(), |x: i32| Ok(x));
        assert_eq!(
            out.try_read(Instant::now() + Duration::from_millis(10)),
            Ok(Some(Vec::new()))
        );
    }
}

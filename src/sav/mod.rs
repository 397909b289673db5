//! Single-assignment variable (SAV).
//!
//! ## State machine
//!
//! ```text
//!            bind(v) / bind_unique(v)
//!   Unbound ───────────────────────────► Bound(v)
//!      │
//!      └───────────────────────────────► Failed(e)
//!            bind_error(e)
//! ```
//!
//! At most one transition ever happens; `Bound`/`Failed` are terminal.
//! Rebinding `Bound(v)` to an equal `v` is accepted silently (`bind` only
//! — `bind_unique` always rejects a second bind).
//!
//! ## Synchronization
//!
//! A single mutex guards the state plus the pending handler list; blocked
//! readers park on a [`Condvar`] rather than being tracked as an explicit
//! list, since `Condvar::notify_all` already releases every blocked thread
//! atomically with the state transition. Handlers *are* tracked explicitly,
//! in registration order, because they must be submitted to the scheduler
//! in that order — something a condvar can't express.
//!
//! No lock is ever held while a handler runs or while submitting to the
//! scheduler: the state is flipped, the handler list is drained, the lock
//! is dropped, and only then are handlers dispatched.

#[cfg(feature = "async")]
mod async_support;
mod lazy;
mod then;

#[cfg(feature = "async")]
pub use async_support::SavFuture;
pub use lazy::{LazyOutcome, LazySav};
pub use then::ThenOutcome;

use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::error::{BindError, ReadError, TryReadError};
use crate::notify::NotifyFn;
use crate::scheduler::{Scheduler, default_scheduler};

type Handler<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

enum State<T, E> {
    Unbound {
        handlers: Vec<Handler<T, E>>,
        notify: Vec<NotifyFn>,
    },
    Bound(T),
    Failed(E),
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    condvar: Condvar,
    scheduler: Arc<dyn Scheduler>,
}

/// A one-shot value cell: bound or failed at most once, read any number of
/// times afterward.
pub struct Sav<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Sav<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Sav<T, E> {
    pub fn new() -> Self {
        Self::with_scheduler(default_scheduler())
    }

    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Unbound {
                    handlers: Vec::new(),
                    notify: Vec::new(),
                }),
                condvar: Condvar::new(),
                scheduler,
            }),
        }
    }

    /// A SAV already bound to `v` (e.g. to thread a literal value through
    /// an API expecting a `Sav`).
    pub fn bound(v: T) -> Self {
        let sav = Self::new();
        sav.bind(v).ok();
        sav
    }

    /// A SAV already failed with `e`.
    pub fn failed(e: E) -> Self {
        let sav = Self::new();
        sav.bind_error(e).ok();
        sav
    }

    /// Unbound → Bound(v). Idempotent rebind to an equal value is silently
    /// accepted; any other rebind (or binding after `Failed`) raises
    /// [`BindError`].
    pub fn bind(&self, v: T) -> Result<(), BindError<T>>
    where
        T: PartialEq,
    {
        let mut guard = self.shared.state.lock().unwrap();
        match &*guard {
            State::Bound(existing) if existing == &v => return Ok(()),
            State::Bound(_) | State::Failed(_) => return Err(BindError(v)),
            State::Unbound { .. } => {}
        }
        self.transition(guard, State::Bound(v));
        Ok(())
    }

    /// Unbound → Bound(v). Unlike [`bind`](Self::bind), any second call
    /// fails regardless of value equality.
    pub fn bind_unique(&self, v: T) -> Result<(), BindError<T>> {
        let mut guard = self.shared.state.lock().unwrap();
        if !matches!(&*guard, State::Unbound { .. }) {
            return Err(BindError(v));
        }
        self.transition(guard, State::Bound(v));
        Ok(())
    }

    /// Unbound → Failed(e).
    pub fn bind_error(&self, e: E) -> Result<(), BindError<E>> {
        let mut guard = self.shared.state.lock().unwrap();
        if !matches!(&*guard, State::Unbound { .. }) {
            return Err(BindError(e));
        }
        self.transition(guard, State::Failed(e));
        Ok(())
    }

    /// Flips the state, drains waiters (via `notify_all`) and handlers,
    /// and dispatches handlers/notifications only after releasing the
    /// lock, so a handler never executes under the SAV's own lock.
    fn transition(&self, mut guard: std::sync::MutexGuard<'_, State<T, E>>, new: State<T, E>) {
        let old = std::mem::replace(&mut *guard, new);
        drop(guard);
        self.shared.condvar.notify_all();

        let (handlers, notify) = match old {
            State::Unbound { handlers, notify } => (handlers, notify),
            State::Bound(_) | State::Failed(_) => unreachable!("transition from terminal state"),
        };

        let outcome = || -> Result<T, E> {
            match &*self.shared.state.lock().unwrap() {
                State::Bound(v) => Ok(v.clone()),
                State::Failed(e) => Err(e.clone()),
                State::Unbound { .. } => unreachable!(),
            }
        };
        for h in handlers {
            let snapshot = outcome();
            self.shared.scheduler.submit(Box::new(move || h(snapshot)));
        }
        for n in notify {
            n();
        }
    }

    /// Blocks until the cell is terminal; returns the value or re-raises
    /// the failure.
    pub fn read(&self) -> Result<T, ReadError<E>> {
        let guard = self.shared.state.lock().unwrap();
        let guard = self
            .shared
            .condvar
            .wait_while(guard, |s| matches!(s, State::Unbound { .. }))
            .unwrap();
        match &*guard {
            State::Bound(v) => Ok(v.clone()),
            State::Failed(e) => Err(ReadError(e.clone())),
            State::Unbound { .. } => unreachable!("wait_while only returns on terminal state"),
        }
    }

    /// Non-blocking: the bound value if any, else `None`. Never raises —
    /// a `Failed` cell also yields `None`, since it has no value to hand
    /// back.
    pub fn poll(&self) -> Option<T> {
        match &*self.shared.state.lock().unwrap() {
            State::Bound(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// As [`read`](Self::read), bounded by a deadline; returns `Ok(None)`
    /// on timeout rather than blocking forever.
    pub fn try_read(&self, deadline: Instant) -> Result<Option<T>, TryReadError<E>> {
        let mut guard = self.shared.state.lock().unwrap();
        loop {
            match &*guard {
                State::Bound(v) => return Ok(Some(v.clone())),
                State::Failed(e) => return Err(TryReadError::Failed(e.clone())),
                State::Unbound { .. } => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (g, timeout) = self
                .shared
                .condvar
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = g;
            if timeout.timed_out() && matches!(&*guard, State::Unbound { .. }) {
                return Ok(None);
            }
        }
    }

    /// Registers `h` to run (via the scheduler) once the cell becomes
    /// terminal. If already terminal, `h` is scheduled immediately with
    /// the current outcome.
    pub fn when_bound(&self, h: impl FnOnce(Result<T, E>) + Send + 'static) {
        let mut guard = self.shared.state.lock().unwrap();
        match &mut *guard {
            State::Unbound { handlers, .. } => handlers.push(Box::new(h)),
            State::Bound(v) => {
                let v = v.clone();
                drop(guard);
                self.shared.scheduler.submit(Box::new(move || h(Ok(v))));
            }
            State::Failed(e) => {
                let e = e.clone();
                drop(guard);
                self.shared.scheduler.submit(Box::new(move || h(Err(e))));
            }
        }
    }

    /// Registers a lightweight "value is ready" ping used by [`crate::select`];
    /// unlike [`when_bound`](Self::when_bound) it carries no value and may
    /// be invoked zero or one times (a SAV only ever transitions once).
    pub(crate) fn register_notify(&self, notify: NotifyFn) {
        let mut guard = self.shared.state.lock().unwrap();
        match &mut *guard {
            State::Unbound { notify: n, .. } => n.push(notify),
            State::Bound(_) | State::Failed(_) => {
                drop(guard);
                notify();
            }
        }
    }

    /// Non-blocking, total peek at a terminal state (unlike `poll`, this
    /// distinguishes `Failed` rather than collapsing it to `None`). Used by
    /// the async bridge, which needs to resolve `Failed` immediately rather
    /// than waiting on a notification that has already fired.
    #[cfg(feature = "async")]
    pub(crate) fn peek_terminal(&self) -> Option<Result<T, E>> {
        match &*self.shared.state.lock().unwrap() {
            State::Bound(v) => Some(Ok(v.clone())),
            State::Failed(e) => Some(Err(e.clone())),
            State::Unbound { .. } => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(&*self.shared.state.lock().unwrap(), State::Bound(_))
    }

    pub fn has_value(&self) -> bool {
        self.is_bound()
    }
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Default for Sav<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn thread_read_unblocks_on_bind() {
        let sav: Sav<i32, String> = Sav::new();
        let reader = sav.clone();
        let handle = thread::spawn(move || reader.read().unwrap());

        thread::sleep(Duration::from_millis(20));
        sav.bind(7).unwrap();

        assert_eq!(handle.join().unwrap(), 7);
        // Idempotent rebind to the same value is silent.
        sav.bind(7).unwrap();
        assert!(matches!(sav.bind_unique(7), Err(BindError(7))));
    }

    #[test]
    fn rebind_to_different_value_fails() {
        let sav: Sav<i32, String> = Sav::new();
        sav.bind(1).unwrap();
        assert!(matches!(sav.bind(2), Err(BindError(2))));
        assert_eq!(sav.poll(), Some(1));
    }

    #[test]
    fn poll_never_raises_on_failed() {
        let sav: Sav<i32, &'static str> = Sav::new();
        sav.bind_error("boom").unwrap();
        assert_eq!(sav.poll(), None);
        assert_eq!(sav.read(), Err(ReadError("boom")));
    }

    #[test]
    fn try_read_times_out() {
        let sav: Sav<i32, String> = Sav::new();
        let deadline = Instant::now() + Duration::from_millis(30);
        assert_eq!(sav.try_read(deadline), Ok(None));
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let sav: Sav<i32, String> = Sav::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            sav.when_bound(move |_| order.lock().unwrap().push(i));
        }
        sav.bind(42).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn when_bound_after_terminal_runs_immediately_with_current_state() {
        let sav: Sav<i32, String> = Sav::new();
        sav.bind(9).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        sav.when_bound(move |v| tx.send(v).unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_millis(200)).unwrap(), Ok(9));
    }
}

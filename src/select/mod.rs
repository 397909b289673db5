//! Non-deterministic multi-way select across a heterogeneous channel set.
//!
//! ```text
//!  channels: [ Sav<i32,_>, ptp::Receiver<String>, broadcast::ReadView<_> ]
//!                  │               │                      │
//!                  └───────register_notify("i ready")──────┘
//!                                  │
//!                      Select { disabled[], pending[] }
//!                                  │
//!                         do_select(start, request)
//! ```
//!
//! Every channel is type-erased behind [`SelectSource`] so `Select` can
//! hold a single heterogeneous `Vec` of them. One mutex guards both the
//! `disabled` vector and the pending-request queue, so the synchronous
//! scan in [`Select::do_select`] and the bound-notification path triggered
//! by a channel becoming ready can never interleave.
//!
//! `poll_erased` on every source must be non-blocking and must not call
//! back into `Select` while holding the channel's own lock — the
//! lock-ordering discipline is channel locks may be taken while holding
//! the select lock, never the reverse.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use rand::Rng;

use crate::broadcast::ReadView as BroadcastReadView;
use crate::notify::NotifyFn;
use crate::ptp::{BoundedReceiver, Receiver as PtpReceiver};
use crate::sav::Sav;

/// A channel that `Select` can poll without blocking and subscribe to for
/// a "became ready" ping.
pub trait SelectSource: Send + Sync {
    /// Returns the next available value, type-erased, or `None`. Must
    /// never block and must not re-enter `Select`.
    fn poll_erased(&self) -> Option<Box<dyn Any + Send>>;

    /// Whether this channel is single-assignment (a SAV): once picked by
    /// any `SelectRequest`, it must never be offered again.
    fn is_single_assignment(&self) -> bool;

    /// Registers a zero-payload "became ready" ping, invoked at most once
    /// per value becoming available (more precisely: at least once per
    /// value, Select re-derives readiness itself via `poll_erased`).
    fn register_notify(&self, notify: NotifyFn);
}

impl<T: Clone + Send + PartialEq + 'static, E: Clone + Send + 'static> SelectSource for Sav<T, E> {
    fn poll_erased(&self) -> Option<Box<dyn Any + Send>> {
        self.poll().map(|v| Box::new(v) as Box<dyn Any + Send>)
    }

    fn is_single_assignment(&self) -> bool {
        true
    }

    fn register_notify(&self, notify: NotifyFn) {
        Sav::register_notify(self, notify);
    }
}

impl<T: Clone + Send + 'static> SelectSource for PtpReceiver<T> {
    fn poll_erased(&self) -> Option<Box<dyn Any + Send>> {
        self.poll_for_select().map(|v| Box::new(v) as Box<dyn Any + Send>)
    }

    fn is_single_assignment(&self) -> bool {
        false
    }

    fn register_notify(&self, notify: NotifyFn) {
        self.register_select_notify(notify);
    }
}

impl<T: Clone + Send + 'static, const N: usize> SelectSource for BoundedReceiver<T, N> {
    fn poll_erased(&self) -> Option<Box<dyn Any + Send>> {
        self.poll_for_select().map(|v| Box::new(v) as Box<dyn Any + Send>)
    }

    fn is_single_assignment(&self) -> bool {
        false
    }

    fn register_notify(&self, notify: NotifyFn) {
        self.register_select_notify(notify);
    }
}

impl<T: Clone + Send + 'static> SelectSource for BroadcastReadView<T> {
    fn poll_erased(&self) -> Option<Box<dyn Any + Send>> {
        self.poll_for_select().map(|v| Box::new(v) as Box<dyn Any + Send>)
    }

    fn is_single_assignment(&self) -> bool {
        false
    }

    fn register_notify(&self, notify: NotifyFn) {
        self.register_select_notify(notify);
    }
}

type OnValue = Box<dyn FnOnce(usize, Box<dyn Any + Send>) + Send>;

/// A pending select, one-shot: a mask over channel indices, a callback to
/// invoke on success, and (for callers that want to block instead of
/// supplying a callback) a result slot.
pub struct SelectRequest {
    mask: Vec<bool>,
    on_value: Mutex<Option<OnValue>>,
}

impl SelectRequest {
    pub fn new(mask: Vec<bool>, on_value: impl FnOnce(usize, Box<dyn Any + Send>) + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            mask,
            on_value: Mutex::new(Some(Box::new(on_value))),
        })
    }

    fn accepts(&self, index: usize) -> bool {
        self.mask.get(index).copied().unwrap_or(false)
    }

    /// Takes the callback out so at most one thread ever invokes it, then
    /// runs it. A no-op if already consumed.
    fn fire(self: &Arc<Self>, index: usize, value: Box<dyn Any + Send>) -> bool {
        let cb = self.on_value.lock().unwrap().take();
        match cb {
            Some(cb) => {
                cb(index, value);
                true
            }
            None => false,
        }
    }
}

struct SelectState {
    disabled: Vec<bool>,
    pending: VecDeque<Arc<SelectRequest>>,
}

/// A fixed, ordered set of heterogeneous channels with a single
/// non-deterministic "pick the first ready one" operation.
pub struct Select {
    channels: Vec<Arc<dyn SelectSource>>,
    state: Arc<Mutex<SelectState>>,
}

impl Select {
    /// Builds a select over `channels` in the given order (index = position
    /// in this list) and registers a ready-notification on each so a
    /// pending request is served as soon as any channel becomes ready.
    pub fn new(channels: Vec<Arc<dyn SelectSource>>) -> Self {
        let state = Arc::new(Mutex::new(SelectState {
            disabled: vec![false; channels.len()],
            pending: VecDeque::new(),
        }));

        for (index, channel) in channels.iter().enumerate() {
            let state = state.clone();
            // A strong reference here would close a cycle (channel → this
            // notify closure → channel), leaking the channel for the
            // process lifetime even after `Select` and every user handle
            // drop. A weak back-reference lets the channel's own `Arc`
            // count reach zero normally; `on_channel_ready` just treats an
            // upgrade failure as nothing left to notify.
            let channel_for_notify = Arc::downgrade(channel);
            let notify: NotifyFn = Arc::new(move || {
                if let Some(channel) = channel_for_notify.upgrade() {
                    on_channel_ready(&state, &channel, index);
                }
            });
            channel.register_notify(notify);
        }

        Self { channels, state }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Scans the channel set starting at `start_index` (or a uniformly
    /// random index if `start_index` is `None`) for the first non-disabled,
    /// mask-matching channel with a value. If one is found, fires `req`
    /// synchronously and returns. Otherwise enqueues `req` to be served
    /// the next time a matching channel becomes ready.
    pub fn do_select(&self, start_index: Option<usize>, req: Arc<SelectRequest>) {
        let n = self.channels.len();
        if n == 0 {
            return;
        }
        let start = start_index.unwrap_or_else(|| rand::thread_rng().gen_range(0..n));

        let mut state = self.state.lock().unwrap();
        for k in 0..n {
            let i = (start + k) % n;
            if !req.accepts(i) || state.disabled[i] {
                continue;
            }
            if let Some(v) = self.channels[i].poll_erased() {
                if self.channels[i].is_single_assignment() {
                    state.disabled[i] = true;
                }
                drop(state);
                req.fire(i, v);
                return;
            }
        }
        state.pending.push_back(req);
    }
}

/// Invoked whenever the channel at `ready_index` transitions to having a
/// value. Serves the first matching pending request in registration
/// order, per the source's own iteration policy.
fn on_channel_ready(state: &Arc<Mutex<SelectState>>, channel: &Arc<dyn SelectSource>, ready_index: usize) {
    let mut guard = state.lock().unwrap();
    if guard.disabled[ready_index] {
        return;
    }
    let mut served = None;
    for (pos, req) in guard.pending.iter().enumerate() {
        if !req.accepts(ready_index) {
            continue;
        }
        if let Some(v) = channel.poll_erased() {
            if channel.is_single_assignment() {
                guard.disabled[ready_index] = true;
            }
            served = Some((pos, req.clone(), v));
            break;
        }
    }
    let Some((pos, req, v)) = served else { return };
    guard.pending.remove(pos);
    drop(guard);
    req.fire(ready_index, v);
}

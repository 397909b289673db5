//! Broadcast channel: fan-out of every written value to every subscriber
//! present at write time.
//!
//! ```text
//!  write(v) ──► [ log: Vec<T> ] ──┬──► ReadView(cursor=0)
//!                                 ├──► ReadView(cursor=3)
//!                                 └──► ReadView(cursor=7)
//! ```
//!
//! `write` and `createReadChannel` share one mutex, so a subscriber created
//! concurrently with a write either sees the value (cursor starts past it)
//! or doesn't (cursor starts at it) — never both and never neither. Each
//! `ReadView` is a cursor into the shared log; once every live cursor has
//! passed a log position, that prefix is trimmed so the log never grows
//! without bound in a long-running process.

#[cfg(feature = "async")]
mod async_support;

#[cfg(feature = "async")]
pub use async_support::ReadViewFuture;

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::error::TryRecvError;
use crate::notify::NotifyFn;
use crate::scheduler::{Scheduler, default_scheduler};

type Tap<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Inner<T> {
    log: Vec<T>,
    trimmed: usize, // log[0] corresponds to absolute position `trimmed`
    next_sub_id: u64,
    cursors: HashMap<u64, usize>, // subscriber id -> absolute read position
    taps: HashMap<u64, Vec<Tap<T>>>,
    select_notify: HashMap<u64, Vec<NotifyFn>>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    scheduler: Arc<dyn Scheduler>,
}

/// A fan-out channel. Clone to share a write handle; `create_read_channel`
/// to subscribe.
pub struct Broadcast<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    pub fn new() -> Self {
        Self::with_scheduler(default_scheduler())
    }

    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    log: Vec::new(),
                    trimmed: 0,
                    next_sub_id: 0,
                    cursors: HashMap::new(),
                    taps: HashMap::new(),
                    select_notify: HashMap::new(),
                }),
                not_empty: Condvar::new(),
                scheduler,
            }),
        }
    }

    /// Appends `v` to the log; every live subscriber observes it from
    /// their next read. Never fails.
    pub fn write(&self, v: T) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.log.push(v.clone());
        let taps: Vec<Tap<T>> = inner.taps.values().flatten().cloned().collect();
        let notify: Vec<NotifyFn> = inner.select_notify.values().flatten().cloned().collect();
        drop(inner);

        self.shared.not_empty.notify_all();
        for tap in taps {
            let v = v.clone();
            self.shared.scheduler.submit(Box::new(move || tap(v)));
        }
        for n in notify {
            n();
        }
    }

    /// Returns a new read-view positioned at the current write head:
    /// values written before this call are not visible to it; every value
    /// written after is.
    pub fn create_read_channel(&self) -> ReadView<T> {
        let mut inner = self.shared.inner.lock().unwrap();
        let id = inner.next_sub_id;
        inner.next_sub_id += 1;
        let pos = inner.trimmed + inner.log.len();
        inner.cursors.insert(id, pos);
        ReadView {
            shared: self.shared.clone(),
            id,
        }
    }
}

impl<T: Clone + Send + 'static> Default for Broadcast<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber's read cursor into a [`Broadcast`] log.
pub struct ReadView<T> {
    shared: Arc<Shared<T>>,
    id: u64,
}

impl<T: Clone + Send + 'static> ReadView<T> {
    fn take_at(inner: &mut Inner<T>, pos: usize) -> Option<T> {
        if pos < inner.trimmed {
            unreachable!("cursor fell behind the trimmed log prefix");
        }
        inner.log.get(pos - inner.trimmed).cloned()
    }

    /// Non-blocking: the next unread value, if any.
    pub fn poll(&self) -> Option<T> {
        let mut inner = self.shared.inner.lock().unwrap();
        let pos = *inner.cursors.get(&self.id).unwrap();
        let v = Self::take_at(&mut inner, pos)?;
        inner.cursors.insert(self.id, pos + 1);
        trim(&mut inner);
        Some(v)
    }

    /// Blocks until the next value is written.
    pub fn read(&self) -> T {
        let mut inner = self.shared.inner.lock().unwrap();
        loop {
            let pos = *inner.cursors.get(&self.id).unwrap();
            if let Some(v) = Self::take_at(&mut inner, pos) {
                inner.cursors.insert(self.id, pos + 1);
                trim(&mut inner);
                return v;
            }
            inner = self.shared.not_empty.wait(inner).unwrap();
        }
    }

    pub fn try_read(&self, deadline: Instant) -> Result<T, TryRecvError> {
        let mut inner = self.shared.inner.lock().unwrap();
        loop {
            let pos = *inner.cursors.get(&self.id).unwrap();
            if let Some(v) = Self::take_at(&mut inner, pos) {
                inner.cursors.insert(self.id, pos + 1);
                trim(&mut inner);
                return Ok(v);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TryRecvError);
            }
            let (i, timeout) = self
                .shared
                .not_empty
                .wait_timeout(inner, deadline - now)
                .unwrap();
            inner = i;
            if timeout.timed_out() {
                let pos = *inner.cursors.get(&self.id).unwrap();
                if Self::take_at(&mut inner, pos).is_none() {
                    return Err(TryRecvError);
                }
            }
        }
    }

    /// Registers `h` to be invoked (via the scheduler) for every value
    /// written from this view's subscription point onward, in write
    /// order, independent of this view's own `read`/`poll` cursor.
    pub fn whenever_bound(&self, h: impl Fn(T) + Send + Sync + 'static) {
        self.shared
            .inner
            .lock()
            .unwrap()
            .taps
            .entry(self.id)
            .or_default()
            .push(Arc::new(h));
    }

    pub(crate) fn register_select_notify(&self, notify: NotifyFn) {
        self.shared
            .inner
            .lock()
            .unwrap()
            .select_notify
            .entry(self.id)
            .or_default()
            .push(notify);
    }

    pub(crate) fn poll_for_select(&self) -> Option<T> {
        self.poll()
    }
}

impl<T> Drop for ReadView<T> {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.cursors.remove(&self.id);
        inner.taps.remove(&self.id);
        inner.select_notify.remove(&self.id);
        trim(&mut inner);
    }
}

/// Drops the log prefix every live cursor has already passed.
fn trim<T>(inner: &mut Inner<T>) {
    let floor = inner.cursors.values().copied().min();
    let Some(floor) = floor else {
        // No subscribers left; keep the log as-is so a future subscriber
        // created before any write still sees nothing extra, but don't
        // grow unbounded either — drop everything already written since
        // no one can observe it.
        inner.trimmed += inner.log.len();
        inner.log.clear();
        return;
    };
    if floor > inner.trimmed {
        let drop_count = floor - inner.trimmed;
        inner.log.drain(0..drop_count);
        inner.trimmed = floor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fan_out_to_all_subscribers_present_at_write_time() {
        let b: Broadcast<&'static str> = Broadcast::new();
        let s1 = b.create_read_channel();
        let s2 = b.create_read_channel();
        b.write("A");
        b.write("B");
        b.write("C");
        let s3 = b.create_read_channel();
        b.write("D");

        assert_eq!(s1.read(), "A");
        assert_eq!(s1.read(), "B");
        assert_eq!(s1.read(), "C");
        assert_eq!(s1.read(), "D");

        assert_eq!(s2.read(), "A");
        assert_eq!(s2.read(), "B");
        assert_eq!(s2.read(), "C");
        assert_eq!(s2.read(), "D");

        assert_eq!(s3.read(), "D");
    }

    #[test]
    fn subscriber_created_after_a_write_does_not_see_it() {
        let b: Broadcast<i32> = Broadcast::new();
        b.write(1);
        let s = b.create_read_channel();
        assert_eq!(
            s.try_read(Instant::now() + std::time::Duration::from_millis(20)),
            Err(TryRecvError)
        );
    }

    #[test]
    fn read_blocks_until_write() {
        let b: Broadcast<i32> = Broadcast::new();
        let s = b.create_read_channel();
        let handle = thread::spawn(move || s.read());
        thread::sleep(std::time::Duration::from_millis(20));
        b.write(9);
        assert_eq!(handle.join().unwrap(), 9);
    }

    #[test]
    fn trims_once_every_subscriber_passes() {
        let b: Broadcast<i32> = Broadcast::new();
        let s1 = b.create_read_channel();
        let s2 = b.create_read_channel();
        for i in 0..5 {
            b.write(i);
        }
        for _ in 0..5 {
            s1.read();
        }
        {
            let inner = b.shared.inner.lock().unwrap();
            assert_eq!(inner.trimmed, 0); // s2 hasn't caught up yet
        }
        for _ in 0..5 {
            s2.read();
        }
        {
            let inner = b.shared.inner.lock().unwrap();
            assert_eq!(inner.trimmed, 5);
            assert!(inner.log.is_empty());
        }
    }

    #[test]
    fn whenever_bound_taps_every_value_independently_of_cursor() {
        let b: Broadcast<i32> = Broadcast::new();
        let s = b.create_read_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        s.whenever_bound(move |v| seen2.lock().unwrap().push(v));
        b.write(1);
        b.write(2);
        thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(s.poll(), Some(1));
        assert_eq!(s.poll(), Some(2));
    }
}

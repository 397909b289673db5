use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crossbeam_utils::CachePadded;

use crate::error::{TryRecvError, TrySendErr};
use crate::notify::NotifyFn;
use crate::ring::RingBuffer;
use crate::scheduler::{Scheduler, default_scheduler};

type Tap<T> = Arc<dyn Fn(T) + Send + Sync>;

struct State<T, const N: usize> {
    ring: RingBuffer<UnsafeCell<MaybeUninit<T>>, N>,
    head: usize, // next slot to write
    tail: usize, // next slot to read
    len: usize,
    taps: Vec<Tap<T>>,
    select_notify: Vec<NotifyFn>,
    senders: usize,
    receivers: usize,
}

struct Shared<T, const N: usize> {
    state: CachePadded<Mutex<State<T, N>>>,
    not_empty: Condvar,
    not_full: Condvar,
    scheduler: Arc<dyn Scheduler>,
}

pub fn bounded_channel<T: Clone + Send + 'static, const N: usize>()
-> (BoundedSender<T, N>, BoundedReceiver<T, N>) {
    bounded_channel_with_scheduler(default_scheduler())
}

pub fn bounded_channel_with_scheduler<T: Clone + Send + 'static, const N: usize>(
    scheduler: Arc<dyn Scheduler>,
) -> (BoundedSender<T, N>, BoundedReceiver<T, N>) {
    let shared = Arc::new(Shared {
        state: CachePadded::new(Mutex::new(State {
            ring: RingBuffer::default(),
            head: 0,
            tail: 0,
            len: 0,
            taps: Vec::new(),
            select_notify: Vec::new(),
            senders: 1,
            receivers: 1,
        })),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        scheduler,
    });
    (
        BoundedSender {
            shared: shared.clone(),
        },
        BoundedReceiver { shared },
    )
}

pub struct BoundedSender<T, const N: usize> {
    shared: Arc<Shared<T, N>>,
}

pub struct BoundedReceiver<T, const N: usize> {
    shared: Arc<Shared<T, N>>,
}

impl<T, const N: usize> Clone for BoundedSender<T, N> {
    fn clone(&self) -> Self {
        self.shared.state.lock().unwrap().senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, const N: usize> Clone for BoundedReceiver<T, N> {
    fn clone(&self) -> Self {
        self.shared.state.lock().unwrap().receivers += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, const N: usize> Drop for BoundedSender<T, N> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.senders -= 1;
        if state.senders == 0 {
            drop(state);
            self.shared.not_empty.notify_all();
        }
    }
}

impl<T, const N: usize> Drop for BoundedReceiver<T, N> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.receivers -= 1;
        if state.receivers == 0 {
            drop(state);
            self.shared.not_full.notify_all();
        }
    }
}

impl<T, const N: usize> Drop for State<T, N> {
    fn drop(&mut self) {
        let mut idx = self.tail;
        for _ in 0..self.len {
            // SAFETY: exactly the `len` slots starting at `tail` hold
            // initialized values; everything else in the ring is untouched.
            unsafe { self.ring.drop(self.ring.index(idx)) };
            idx += 1;
        }
    }
}

impl<T: Clone + Send + 'static, const N: usize> BoundedSender<T, N> {
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().unwrap().receivers == 0
    }

    /// Blocks until there is free capacity, then writes `v`. If every
    /// receiver drops while this call is parked waiting for space, `v` is
    /// dropped instead of being pushed past capacity — there is no reader
    /// left to observe it either way, and the ring only has room for `N`
    /// initialized slots.
    pub fn write(&self, v: T) {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if state.len < N {
                break;
            }
            if state.receivers == 0 {
                return;
            }
            state = self.shared.not_full.wait(state).unwrap();
        }
        self.push(state, v);
    }

    /// Writes `v` without blocking; fails if the ring is full or every
    /// reader has dropped.
    pub fn try_write(&self, v: T) -> Result<(), TrySendErr<T>> {
        let state = self.shared.state.lock().unwrap();
        if state.receivers == 0 {
            return Err(TrySendErr::Disconnected(v));
        }
        if state.len == N {
            return Err(TrySendErr::Full(v));
        }
        self.push(state, v);
        Ok(())
    }

    /// Registers `h` to be invoked (via the scheduler) for every value
    /// written from now on, in write order — a tap alongside ordinary
    /// readers, not competing with them for values.
    pub fn whenever_bound(&self, h: impl Fn(T) + Send + Sync + 'static) {
        self.shared.state.lock().unwrap().taps.push(Arc::new(h));
    }

    fn push(&self, mut state: std::sync::MutexGuard<'_, State<T, N>>, v: T) {
        let idx = state.ring.index(state.head);
        // SAFETY: `idx` is the slot just past the logical tail, i.e. not
        // one of the `len` initialized slots; writing it is safe and
        // grows the initialized range by one.
        unsafe { state.ring.write(idx, v.clone()) };
        state.head += 1;
        state.len += 1;
        let taps = state.taps.clone();
        // Cloned, not drained: a `Select` registers once at construction and
        // expects to be pinged on every subsequent write, not just the first.
        let notify = state.select_notify.clone();
        drop(state);

        self.shared.not_empty.notify_one();
        for tap in taps {
            let v = v.clone();
            self.shared.scheduler.submit(Box::new(move || tap(v)));
        }
        for n in notify {
            n();
        }
    }
}

impl<T: Clone + Send + 'static, const N: usize> BoundedReceiver<T, N> {
    pub fn is_closed(&self) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.senders == 0 && state.len == 0
    }

    fn pop(state: &mut State<T, N>) -> T {
        let idx = state.ring.index(state.tail);
        // SAFETY: the slot at the logical tail is one of the `len`
        // initialized slots.
        let v = unsafe { state.ring.read(idx) };
        state.tail += 1;
        state.len -= 1;
        v
    }

    /// Dequeues the next value if one is queued; non-blocking.
    pub fn poll(&self) -> Option<T> {
        let mut state = self.shared.state.lock().unwrap();
        if state.len == 0 {
            return None;
        }
        let v = Self::pop(&mut state);
        drop(state);
        self.shared.not_full.notify_one();
        Some(v)
    }

    /// Blocks until a value is available or the channel is closed with an
    /// empty queue.
    pub fn read(&self) -> Result<T, TryRecvError> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if state.len > 0 {
                let v = Self::pop(&mut state);
                drop(state);
                self.shared.not_full.notify_one();
                return Ok(v);
            }
            if state.senders == 0 {
                return Err(TryRecvError);
            }
            state = self.shared.not_empty.wait(state).unwrap();
        }
    }

    pub fn try_read(&self, deadline: Instant) -> Result<Option<T>, TryRecvError> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if state.len > 0 {
                let v = Self::pop(&mut state);
                drop(state);
                self.shared.not_full.notify_one();
                return Ok(Some(v));
            }
            if state.senders == 0 {
                return Err(TryRecvError);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (s, timeout) = self
                .shared
                .not_empty
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = s;
            if timeout.timed_out() && state.len == 0 {
                return Ok(None);
            }
        }
    }

    pub(crate) fn register_select_notify(&self, notify: NotifyFn) {
        self.shared.state.lock().unwrap().select_notify.push(notify);
    }

    pub(crate) fn poll_for_select(&self) -> Option<T> {
        self.poll()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::thread;

    #[test]
    fn fifo_within_capacity() {
        let (tx, rx) = bounded_channel::<i32, 4>();
        tx.write(1);
        tx.write(2);
        tx.write(3);
        assert_eq!(rx.poll(), Some(1));
        assert_eq!(rx.poll(), Some(2));
        assert_eq!(rx.poll(), Some(3));
        assert_eq!(rx.poll(), None);
    }

    #[test]
    fn try_write_reports_full() {
        let (tx, _rx) = bounded_channel::<i32, 2>();
        tx.write(1);
        tx.write(2);
        assert_eq!(tx.try_write(3), Err(TrySendErr::Full(3)));
    }

    #[test]
    fn blocking_write_waits_for_space() {
        let (tx, rx) = bounded_channel::<i32, 1>();
        tx.write(1);
        let tx2 = tx.clone();
        let writer = thread::spawn(move || tx2.write(2));
        thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(rx.poll(), Some(1));
        writer.join().unwrap();
        assert_eq!(rx.poll(), Some(2));
    }

    #[test]
    fn closing_every_receiver_unblocks_writer() {
        let (tx, rx) = bounded_channel::<i32, 1>();
        tx.write(1);
        let tx2 = tx.clone();
        let writer = thread::spawn(move || tx2.try_write(2));
        drop(rx);
        thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(writer.join().unwrap(), Err(TrySendErr::Disconnected(2)));
    }

    #[test]
    fn blocking_write_drops_value_when_last_receiver_drops_while_full() {
        // Regression: a writer parked on a full ring must not push past
        // capacity once every receiver has dropped — doing so wrote into
        // an already-initialized slot without dropping it and left `len`
        // one past `N`, corrupting the ring and `State::drop`'s bookkeeping.
        let (tx, rx) = bounded_channel::<i32, 1>();
        tx.write(1); // ring is now full
        let tx2 = tx.clone();
        let writer = thread::spawn(move || tx2.write(2)); // parks: no space
        drop(rx);
        // Must return (dropping 2) rather than hang or corrupt the ring.
        writer.join().unwrap();
    }

    #[test]
    fn exactly_once_delivery_across_readers() {
        let (tx, rx) = bounded_channel::<i32, 16>();
        for i in 0..50 {
            tx.write(i);
        }
        let received = Arc::new(StdMutex::new(Vec::new()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rx = rx.clone();
                let received = received.clone();
                thread::spawn(move || {
                    loop {
                        match rx.try_read(Instant::now() + std::time::Duration::from_millis(100)) {
                            Ok(Some(v)) => received.lock().unwrap().push(v),
                            Ok(None) => continue,
                            Err(_) => break,
                        }
                    }
                })
            })
            .collect();
        drop(tx);
        for h in handles {
            h.join().unwrap();
        }
        let mut got = received.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, (0..50).collect::<Vec<_>>());
    }
}

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crossbeam_utils::CachePadded;

use crate::error::TryRecvError;
use crate::notify::NotifyFn;
use crate::scheduler::{Scheduler, default_scheduler};

type Tap<T> = Arc<dyn Fn(T) + Send + Sync>;

struct State<T> {
    queue: VecDeque<T>,
    taps: Vec<Tap<T>>,
    select_notify: Vec<NotifyFn>,
    senders: usize,
    receivers: usize,
}

struct Shared<T> {
    state: CachePadded<Mutex<State<T>>>,
    not_empty: Condvar,
    scheduler: Arc<dyn Scheduler>,
}

pub fn channel<T: Clone + Send + 'static>() -> (Sender<T>, Receiver<T>) {
    channel_with_scheduler(default_scheduler())
}

pub fn channel_with_scheduler<T: Clone + Send + 'static>(
    scheduler: Arc<dyn Scheduler>,
) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        state: CachePadded::new(Mutex::new(State {
            queue: VecDeque::new(),
            taps: Vec::new(),
            select_notify: Vec::new(),
            senders: 1,
            receivers: 1,
        })),
        not_empty: Condvar::new(),
        scheduler,
    });
    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}

pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.state.lock().unwrap().senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.shared.state.lock().unwrap().receivers += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.senders -= 1;
        if state.senders == 0 {
            drop(state);
            self.shared.not_empty.notify_all();
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.shared.state.lock().unwrap().receivers -= 1;
    }
}

impl<T: Clone + Send + 'static> Sender<T> {
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().unwrap().receivers == 0
    }

    /// Appends `v` to the queue; dispatches a clone of it to every
    /// `whenever_bound` tap via the scheduler (in write order, independent
    /// of whichever ordinary reader eventually dequeues the original),
    /// wakes one blocked reader, and pings any [`crate::select::Select`]
    /// watching this channel. Never blocks (unbounded).
    pub fn write(&self, v: T) {
        let mut state = self.shared.state.lock().unwrap();
        state.queue.push_back(v.clone());
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

    /// Registers `h` to be invoked (via the scheduler) for every value
    /// written from now on, in write order — a tap alongside ordinary
    /// readers, not competing with them for values.
    pub fn whenever_bound(&self, h: impl Fn(T) + Send + Sync + 'static) {
        self.shared.state.lock().unwrap().taps.push(Arc::new(h));
    }
}

impl<T: Clone + Send + 'static> Receiver<T> {
    pub fn is_closed(&self) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.senders == 0 && state.queue.is_empty()
    }

    /// Dequeues the next value if one is queued; non-blocking.
    pub fn poll(&self) -> Option<T> {
        self.shared.state.lock().unwrap().queue.pop_front()
    }

    /// Blocks until a value is available or the channel is closed with an
    /// empty queue.
    pub fn read(&self) -> Result<T, TryRecvError> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if let Some(v) = state.queue.pop_front() {
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
            if let Some(v) = state.queue.pop_front() {
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
            if timeout.timed_out() && state.queue.is_empty() {
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
    fn exactly_once_delivery_across_readers() {
        let (tx, rx) = channel::<i32>();
        for i in 0..100 {
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
        assert_eq!(got, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn fifo_per_reader() {
        let (tx, rx) = channel::<i32>();
        for i in 0..10 {
            tx.write(i);
        }
        let mut out = Vec::new();
        for _ in 0..10 {
            out.push(rx.poll().unwrap());
        }
        assert_eq!(out, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn read_blocks_until_write() {
        let (tx, rx) = channel::<i32>();
        let handle = thread::spawn(move || rx.read());
        thread::sleep(std::time::Duration::from_millis(20));
        tx.write(5);
        assert_eq!(handle.join().unwrap(), Ok(5));
    }

    #[test]
    fn closing_sender_drains_backlog_then_errors() {
        let (tx, rx) = channel::<i32>();
        tx.write(1);
        tx.write(2);
        drop(tx);
        assert_eq!(rx.read(), Ok(1));
        assert_eq!(rx.read(), Ok(2));
        assert_eq!(rx.read(), Err(TryRecvError));
    }

    #[test]
    fn whenever_bound_taps_see_every_value_alongside_readers() {
        let (tx, rx) = channel::<i32>();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen2 = seen.clone();
        tx.whenever_bound(move |v| seen2.lock().unwrap().push(v));

        tx.write(1);
        tx.write(2);
        thread::sleep(std::time::Duration::from_millis(50));

        // Tap saw both values...
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        // ...and the ordinary reader independently sees both too.
        assert_eq!(rx.poll(), Some(1));
        assert_eq!(rx.poll(), Some(2));
    }
}

//! Async bridge for the unbounded [`Receiver`](super::Receiver) channel,
//! mirroring [`crate::sav::async_support`]: each future owns its
//! own `AtomicWaker` and registers through the same ready-notification hook
//! [`crate::select::Select`] uses, since an unbounded channel is written to
//! (and thus must notify) many times over its life, unlike a one-shot SAV.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;

use super::bounded::BoundedReceiver;
use super::unbounded::Receiver;
use crate::error::TryRecvError;

#[must_use = "futures do nothing unless polled"]
pub struct ReadFuture<T> {
    receiver: Receiver<T>,
    waker: Arc<AtomicWaker>,
    registered: bool,
}

impl<T> Unpin for ReadFuture<T> {}

impl<T: Clone + Send + 'static> Receiver<T> {
    /// As [`read`](Receiver::read), but yields a `Future` instead of
    /// blocking the calling thread.
    pub fn read_async(&self) -> ReadFuture<T> {
        ReadFuture {
            receiver: self.clone(),
            waker: Arc::new(AtomicWaker::new()),
            registered: false,
        }
    }
}

impl<T: Clone + Send + 'static> Future for ReadFuture<T> {
    type Output = Result<T, TryRecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.waker.register(cx.waker());

        if let Some(v) = this.receiver.poll() {
            return Poll::Ready(Ok(v));
        }
        if this.receiver.is_closed() {
            return Poll::Ready(Err(TryRecvError));
        }

        if !this.registered {
            this.registered = true;
            let waker = this.waker.clone();
            this.receiver.register_select_notify(Arc::new(move || waker.wake()));

            // A write landing between the `poll()` above and the
            // registration just above would be missed by any later wakeup,
            // since it serializes on the channel mutex ahead of the
            // registration finishing. Give it a second shot now that the
            // notify closure is in place.
            if let Some(v) = this.receiver.poll() {
                return Poll::Ready(Ok(v));
            }
            if this.receiver.is_closed() {
                return Poll::Ready(Err(TryRecvError));
            }
        }
        Poll::Pending
    }
}

#[must_use = "futures do nothing unless polled"]
pub struct BoundedReadFuture<T, const N: usize> {
    receiver: BoundedReceiver<T, N>,
    waker: Arc<AtomicWaker>,
    registered: bool,
}

impl<T, const N: usize> Unpin for BoundedReadFuture<T, N> {}

impl<T: Clone + Send + 'static, const N: usize> BoundedReceiver<T, N> {
    /// As [`read`](BoundedReceiver::read), but yields a `Future` instead of
    /// blocking the calling thread.
    pub fn read_async(&self) -> BoundedReadFuture<T, N> {
        BoundedReadFuture {
            receiver: self.clone(),
            waker: Arc::new(AtomicWaker::new()),
            registered: false,
        }
    }
}

impl<T: Clone + Send + 'static, const N: usize> Future for BoundedReadFuture<T, N> {
    type Output = Result<T, TryRecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.waker.register(cx.waker());

        if let Some(v) = this.receiver.poll() {
            return Poll::Ready(Ok(v));
        }
        if this.receiver.is_closed() {
            return Poll::Ready(Err(TryRecvError));
        }

        if !this.registered {
            this.registered = true;
            let waker = this.waker.clone();
            this.receiver.register_select_notify(Arc::new(move || waker.wake()));

            // Same missed-wakeup window as the unbounded `ReadFuture`: a
            // write (or the last receiver's drop) landing between the
            // `poll()`/`is_closed()` above and the registration above would
            // otherwise be lost.
            if let Some(v) = this.receiver.poll() {
                return Poll::Ready(Ok(v));
            }
            if this.receiver.is_closed() {
                return Poll::Ready(Err(TryRecvError));
            }
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::super::bounded::bounded_channel;
    use super::super::unbounded::channel;
    use std::time::Duration;

    #[tokio::test]
    async fn bounded_resolves_once_a_value_is_written() {
        let (tx, rx) = bounded_channel::<i32, 4>();
        tx.write(1);
        assert_eq!(rx.read_async().await, Ok(1));
    }

    #[tokio::test]
    async fn resolves_once_a_value_is_written() {
        let (tx, rx) = channel::<i32>();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.write(5);
        });
        assert_eq!(rx.read_async().await, Ok(5));
    }

    #[tokio::test]
    async fn resolves_again_on_a_second_write() {
        let (tx, rx) = channel::<i32>();
        tx.write(1);
        assert_eq!(rx.read_async().await, Ok(1));

        let tx2 = tx.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx2.write(2);
        });
        assert_eq!(rx.read_async().await, Ok(2));
    }

    #[tokio::test]
    async fn errors_once_closed_and_drained() {
        let (tx, rx) = channel::<i32>();
        drop(tx);
        assert!(rx.read_async().await.is_err());
    }
}

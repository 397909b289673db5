//! Async bridge for [`ReadView`], mirroring [`crate::ptp::async_support`]:
//! a `ReadView` is not `Clone` (each one owns a unique subscriber id and
//! cursor), so the future borrows it rather than owning a clone — the
//! same borrowing shape a single-consumer channel's receiver future uses
//! when its receiver isn't `Clone` either.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;

use super::ReadView;

#[must_use = "futures do nothing unless polled"]
pub struct ReadViewFuture<'a, T> {
    view: &'a ReadView<T>,
    waker: Arc<AtomicWaker>,
    registered: bool,
}

impl<T> Unpin for ReadViewFuture<'_, T> {}

impl<T: Clone + Send + 'static> ReadView<T> {
    /// As [`read`](ReadView::read), but yields a `Future` instead of
    /// blocking the calling thread.
    pub fn read_async(&self) -> ReadViewFuture<'_, T> {
        ReadViewFuture {
            view: self,
            waker: Arc::new(AtomicWaker::new()),
            registered: false,
        }
    }
}

impl<T: Clone + Send + 'static> Future for ReadViewFuture<'_, T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.waker.register(cx.waker());

        if let Some(v) = this.view.poll() {
            return Poll::Ready(v);
        }

        if !this.registered {
            this.registered = true;
            let waker = this.waker.clone();
            this.view.register_select_notify(Arc::new(move || waker.wake()));

            // A write landing between the `poll()` above and the
            // registration just above serializes ahead of it on the
            // broadcast mutex and would otherwise never wake this task.
            // Give it a second shot now that the notify closure is in place.
            if let Some(v) = this.view.poll() {
                return Poll::Ready(v);
            }
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::super::Broadcast;
    use std::time::Duration;

    #[tokio::test]
    async fn resolves_once_a_value_is_written() {
        let b: Broadcast<i32> = Broadcast::new();
        let s = b.create_read_channel();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            b.write(9);
        });
        assert_eq!(s.read_async().await, 9);
    }

    #[tokio::test]
    async fn resolves_again_on_a_second_write() {
        let b: Broadcast<i32> = Broadcast::new();
        let s = b.create_read_channel();
        b.write(1);
        assert_eq!(s.read_async().await, 1);
        b.write(2);
        assert_eq!(s.read_async().await, 2);
    }
}

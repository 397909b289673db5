//! `async fn`-free async bridge: a future that resolves once the [`Sav`] it
//! was created from becomes terminal, built on the same `AtomicWaker`
//! register-then-recheck pattern a single-consumer channel's async read
//! future uses.
//!
//! Unlike a single-consumer channel's receiver, a `Sav` can be observed by
//! any number of concurrent readers (sync and async alike), so
//! each [`SavFuture`] owns its own `AtomicWaker` and registers it through
//! [`Sav::register_notify`] — the same one-shot "became ready" hook
//! `crate::select::Select` uses — rather than sharing one waker slot per
//! channel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;

use super::Sav;
use crate::error::ReadError;

/// Future returned by [`Sav::read_async`]. Cancel-safe: dropping it before
/// completion loses nothing, since the `Sav`'s own state is untouched by
/// polling.
#[must_use = "futures do nothing unless polled"]
pub struct SavFuture<T, E> {
    sav: Sav<T, E>,
    waker: Arc<AtomicWaker>,
    registered: bool,
}

impl<T, E> Unpin for SavFuture<T, E> {}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Sav<T, E> {
    /// As [`read`](Sav::read), but yields a `Future` instead of blocking the
    /// calling thread. Resolves immediately if already terminal.
    pub fn read_async(&self) -> SavFuture<T, E> {
        SavFuture {
            sav: self.clone(),
            waker: Arc::new(AtomicWaker::new()),
            registered: false,
        }
    }
}

impl<T: Clone + Send + 'static, E: Clone + Send + 'static> Future for SavFuture<T, E> {
    type Output = Result<T, ReadError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.waker.register(cx.waker());

        if let Some(v) = this.sav.poll() {
            return Poll::Ready(Ok(v));
        }
        // `poll()` never raises, so a `Failed` cell needs its own check.
        if let Some(outcome) = this.sav.peek_terminal() {
            return Poll::Ready(outcome.map_err(ReadError));
        }

        if !this.registered {
            this.registered = true;
            let waker = this.waker.clone();
            this.sav.register_notify(Arc::new(move || waker.wake()));
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resolves_once_bound_from_another_thread() {
        let sav: Sav<i32, String> = Sav::new();
        let writer = sav.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.bind(7).unwrap();
        });
        assert_eq!(sav.read_async().await, Ok(7));
    }

    #[tokio::test]
    async fn already_terminal_resolves_without_waiting() {
        let sav: Sav<i32, String> = Sav::bound(9);
        assert_eq!(sav.read_async().await, Ok(9));
    }

    #[tokio::test]
    async fn failed_cell_re_raises() {
        let sav: Sav<i32, String> = Sav::failed("boom".into());
        assert_eq!(sav.read_async().await, Err(ReadError("boom".to_string())));
    }
}

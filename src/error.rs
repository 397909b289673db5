//! Error kinds shared across the dataflow primitives: a cell already bound
//! to a conflicting value, a read that observes a failed cell, a bounded
//! wait that timed out, and the channel-local `TrySendErr`/`TryRecvError`
//! pair for the point-to-point channel.

use std::fmt;

/// A second `bind`/`bind_unique` on a terminal [`crate::sav::Sav`], or a
/// `bind` whose value disagrees with the one already bound. Carries the
/// rejected value back to the caller so nothing is silently dropped.
#[derive(Debug)]
pub struct BindError<T>(pub T);

impl<T> fmt::Display for BindError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "already bound")
    }
}

impl<T: fmt::Debug> std::error::Error for BindError<T> {}

/// `read()` re-raises the cell's failure as this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError<E>(pub E);

impl<E: fmt::Display> fmt::Display for ReadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read of failed cell: {}", self.0)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ReadError<E> {}

/// Outcome of a bounded-wait (`try_read`/`try_recv` with a deadline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryReadError<E> {
    /// The deadline elapsed before the cell became terminal.
    Timeout,
    /// The cell failed before the deadline.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for TryReadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out waiting for a value"),
            Self::Failed(e) => write!(f, "failed while waiting: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for TryReadError<E> {}

/// Error returned by a full bounded channel's `try_send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrySendErr<T> {
    /// The channel has no free capacity right now.
    Full(T),
    /// The last reader has dropped; the value is handed back.
    Disconnected(T),
}

impl<T> fmt::Display for TrySendErr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => write!(f, "channel is full"),
            Self::Disconnected(_) => write!(f, "channel is disconnected"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TrySendErr<T> {}

/// Error returned when a channel can no longer yield values: the queue is
/// empty and every writer has dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryRecvError;

impl fmt::Display for TryRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel is empty and disconnected")
    }
}

impl std::error::Error for TryRecvError {}

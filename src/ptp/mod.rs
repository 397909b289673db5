//! Point-to-point (PTP) channel: FIFO, many-producers/many-consumers,
//! each value consumed by exactly one reader.
//!
//! ## How it works
//!
//! ```text
//!  writer(s) ──► [ VecDeque<T> ] ──► reader(s)
//!                      │
//!                      └──► tap handlers (whenever_bound), see every value too
//! ```
//!
//! A single mutex guards the value queue; a condvar wakes blocked readers.
//! Unlike a lock-free SPSC ring, this channel must support arbitrary
//! producer/consumer counts and a `whenever_bound` tap that sees every
//! value independently of ordinary readers, which needs a real waiter
//! list rather than two atomic cursors.
//!
//! The bounded variant ([`BoundedSender`]/[`BoundedReceiver`]) reuses
//! [`RingBuffer`](crate::ring::RingBuffer) for fixed-capacity storage,
//! guarded by the same mutex/condvar discipline.

#[cfg(feature = "async")]
mod async_support;
mod bounded;
mod unbounded;

#[cfg(feature = "async")]
pub use async_support::{BoundedReadFuture, ReadFuture};
pub use bounded::{BoundedReceiver, BoundedSender, bounded_channel};
pub use unbounded::{Receiver, Sender, channel};

//! Deterministic, thread-safe dataflow coordination primitives.
//!
//! - [`sav`] — single-assignment variables (one-shot cells), `then`
//!   chaining, `when_all_bound`, and a lazily-initialized variant.
//! - [`ptp`] — point-to-point FIFO channels, bounded and unbounded.
//! - [`broadcast`] — fan-out channel: every subscriber sees every value
//!   written after it subscribes.
//! - [`select`] — non-deterministic multi-way pick across a heterogeneous
//!   channel set.
//! - [`lru`] — bounded LRU cache, plus a `Sav`-backed memoizer for
//!   deduplicating concurrent cache misses.
//! - [`promise`] — `parallel_map`/`parallel_filter`/`parallel_find`/
//!   `parallel_all`/`parallel_any` over a `Vec`, dispatched through the
//!   scheduler.
//! - [`scheduler`] — the external task-scheduler contract every primitive
//!   dispatches handlers through, plus a process-wide default.
//!
//! None of these primitives build or own a thread pool: construct them
//! with an explicit [`scheduler::Scheduler`], or rely on the process-wide
//! default (a detached OS thread per task) installed via
//! [`scheduler::init`].
//!
//! With the default `async` feature, `Sav::read_async`, the PTP receivers'
//! `read_async`, and `broadcast::ReadView::read_async` return
//! `AtomicWaker`-backed futures as an alternative to their blocking
//! `read` counterparts.

pub mod broadcast;
pub mod error;
pub mod lru;
mod notify;
pub mod promise;
pub mod ptp;
mod ring;
pub mod sav;
pub mod scheduler;
pub mod select;

pub use error::{BindError, ReadError, TryReadError, TryRecvError, TrySendErr};
pub use sav::Sav;

//! Shared type for the lightweight "a value is ready" callback that
//! [`crate::select::Select`] registers on every channel it watches.
//!
//! This is distinct from a `when_bound`/`whenever_bound` handler: it
//! carries no value, is cheap to invoke multiple times, and exists purely
//! to tell Select "go re-poll channel i" — the actual value is retrieved
//! separately through the channel's own non-blocking `poll`.

use std::sync::Arc;

pub type NotifyFn = Arc<dyn Fn() + Send + Sync>;

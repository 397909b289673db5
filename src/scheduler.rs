//! The task scheduler collaborator.
//!
//! The core never builds or owns a thread pool; executor construction is
//! out of scope. It only needs `submit(f)`, so any host embedding this
//! crate supplies its own [`Scheduler`]. A process-wide default is kept in
//! a registry so primitives constructed without an explicit scheduler
//! still have somewhere to dispatch handlers.

use std::sync::{Arc, OnceLock, RwLock};

/// A unit of deferred work submitted to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// External task scheduler contract: `submit(thunk)`.
///
/// Reentrant: a submitted task may itself call `submit` (handlers chaining
/// into further handlers). No ordering is guaranteed between independent
/// submissions; ordering *within* a single primitive's handler list is the
/// primitive's own responsibility (it submits handlers one at a time, in
/// registration order).
pub trait Scheduler: Send + Sync {
    fn submit(&self, task: Task);
}

/// Default scheduler: spawns a detached OS thread per task.
///
/// This is deliberately the simplest possible conforming scheduler, not a
/// production executor. It exists so the primitives are usable out of the
/// box.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn submit(&self, task: Task) {
        std::thread::spawn(task);
    }
}

fn registry() -> &'static RwLock<Arc<dyn Scheduler>> {
    static REGISTRY: OnceLock<RwLock<Arc<dyn Scheduler>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Arc::new(ThreadScheduler)))
}

/// Installs `scheduler` as the process-wide default used by primitives
/// constructed without an explicit one.
pub fn init(scheduler: Arc<dyn Scheduler>) {
    *registry().write().unwrap() = scheduler;
}

/// Reverts the process-wide default back to [`ThreadScheduler`].
pub fn shutdown() {
    *registry().write().unwrap() = Arc::new(ThreadScheduler);
}

/// Returns the current process-wide default scheduler.
pub fn default_scheduler() -> Arc<dyn Scheduler> {
    registry().read().unwrap().clone()
}

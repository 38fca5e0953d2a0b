use crate::{sync::LockId, Fatal, WorkerId};
use std::{sync::Arc, time::Duration};

/// Side-channel callbacks the lock primitives invoke but do not define.
///
/// Profiling, preemption and blocking-section bookkeeping belong to the
/// embedding scheduler. Every method has a no-op default, except
/// [`fatal`](Hooks::fatal) which aborts the process.
pub trait Hooks: Send + Sync {
    /// A contended acquire finally took the lock after `waited`.
    fn on_contended(&self, _worker: WorkerId, _lock: LockId, _waited: Duration) {}

    /// The lock word of `lock` was released by `worker`.
    fn on_unlock(&self, _worker: WorkerId, _lock: LockId) {}

    /// `worker` dropped its last lock with a preemption request deferred.
    fn restore_preempt(&self, _worker: WorkerId) {}

    /// `worker` is about to block in a task context.
    fn enter_blocking(&self, _worker: WorkerId) {}

    /// `worker` returned from blocking in a task context.
    fn exit_blocking(&self, _worker: WorkerId) {}

    /// Decides what an invariant violation means for the process.
    fn fatal(&self, _error: &Fatal) -> ! {
        std::process::abort()
    }
}

/// Hooks that ignore every event and abort on fatal errors.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}

impl<H: Hooks + ?Sized> Hooks for Arc<H> {
    fn on_contended(&self, worker: WorkerId, lock: LockId, waited: Duration) {
        (**self).on_contended(worker, lock, waited)
    }

    fn on_unlock(&self, worker: WorkerId, lock: LockId) {
        (**self).on_unlock(worker, lock)
    }

    fn restore_preempt(&self, worker: WorkerId) {
        (**self).restore_preempt(worker)
    }

    fn enter_blocking(&self, worker: WorkerId) {
        (**self).enter_blocking(worker)
    }

    fn exit_blocking(&self, worker: WorkerId) {
        (**self).exit_blocking(worker)
    }

    fn fatal(&self, error: &Fatal) -> ! {
        (**self).fatal(error)
    }
}

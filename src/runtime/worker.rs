use super::{Registry, Slot, WorkerId};
use crate::Fatal;
use std::{
    cell::Cell,
    fmt,
    sync::atomic::Ordering,
    thread,
    time::Instant,
};

/// Which stack a worker is currently running on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExecContext {
    /// The worker's own scheduler context.
    Scheduler,
    /// A task the worker is running on behalf of the scheduler.
    Task,
}

/// A claimed worker slot, used from one thread at a time.
///
/// Every lock and note operation is performed on behalf of a worker: its
/// slot is what gets threaded through lock words, and its semaphore is
/// what the calling thread parks on.
pub struct Worker<'a> {
    registry: &'a Registry,
    id: WorkerId,
    context: Cell<ExecContext>,
}

impl fmt::Debug for Worker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("context", &self.context.get())
            .field("locks", &self.locks_held())
            .finish()
    }
}

impl Drop for Worker<'_> {
    fn drop(&mut self) {
        let count = self.locks_held();
        if count != 0 && !thread::panicking() {
            self.registry.fatal(Fatal::LocksHeldOnExit {
                worker: self.id,
                count,
            });
        }
        self.registry.unregister(self.id);
    }
}

impl<'a> Worker<'a> {
    pub(crate) fn new(registry: &'a Registry, id: WorkerId) -> Self {
        Self {
            registry,
            id,
            context: Cell::new(ExecContext::Scheduler),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub(crate) fn slot(&self) -> &'a Slot {
        self.registry.slot(self.id)
    }

    /// Number of locks this worker currently holds.
    pub fn locks_held(&self) -> isize {
        self.slot().locks.load(Ordering::Relaxed)
    }

    /// Number of times this worker has parked on its semaphore.
    pub fn park_count(&self) -> u64 {
        self.slot().parks.load(Ordering::Relaxed)
    }

    pub fn is_blocked(&self) -> bool {
        self.registry.is_blocked(self.id)
    }

    /// Records a preemption request that must wait until no locks are held.
    pub fn defer_preempt(&self) {
        self.slot().preempt.store(true, Ordering::Relaxed);
    }

    pub fn preempt_pending(&self) -> bool {
        self.slot().preempt.load(Ordering::Relaxed)
    }

    pub fn clear_preempt(&self) {
        self.slot().preempt.store(false, Ordering::Relaxed);
    }

    pub fn context(&self) -> ExecContext {
        self.context.get()
    }

    /// Switches to running a task until the guard is dropped.
    pub fn enter_task(&self) -> TaskGuard<'_, 'a> {
        let previous = self.context.replace(ExecContext::Task);
        TaskGuard {
            worker: self,
            previous,
        }
    }

    pub(crate) fn expect_context(&self, expected: ExecContext, op: &'static str) {
        let actual = self.context.get();
        if actual != expected {
            self.registry.fatal(Fatal::WrongContext {
                op,
                expected,
                actual,
            });
        }
    }

    pub(crate) fn acquire_count(&self) {
        let slot = self.slot();
        let count = slot.locks.load(Ordering::Relaxed);
        if count < 0 {
            self.registry.fatal(Fatal::LockCount {
                worker: self.id,
                count,
            });
        }
        slot.locks.store(count + 1, Ordering::Relaxed);
    }

    /// Returns the hold count left after dropping one lock.
    pub(crate) fn release_count(&self) -> isize {
        let slot = self.slot();
        let count = slot.locks.load(Ordering::Relaxed) - 1;
        slot.locks.store(count, Ordering::Relaxed);
        if count < 0 {
            self.registry.fatal(Fatal::UnlockCount { worker: self.id });
        }
        count
    }

    /// Parks on the worker's semaphore with the blocked flag raised.
    pub(crate) fn park(&self, deadline: Option<Instant>) -> bool {
        let slot = self.slot();
        slot.blocked.store(true, Ordering::Relaxed);
        let signaled = self.registry.park(self.id, deadline);
        slot.blocked.store(false, Ordering::Relaxed);
        signaled
    }
}

/// Restores the worker's previous [`ExecContext`] on drop.
#[derive(Debug)]
pub struct TaskGuard<'w, 'a> {
    worker: &'w Worker<'a>,
    previous: ExecContext,
}

impl Drop for TaskGuard<'_, '_> {
    fn drop(&mut self) {
        self.worker.context.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{testing::PanicHooks, Config};

    fn registry() -> Registry {
        Registry::builder()
            .config(Config::new())
            .hooks(PanicHooks::default())
            .build()
    }

    #[test]
    fn task_guard_restores_context() {
        let registry = registry();
        let worker = registry.register().unwrap();
        assert_eq!(worker.context(), ExecContext::Scheduler);
        {
            let _task = worker.enter_task();
            assert_eq!(worker.context(), ExecContext::Task);
        }
        assert_eq!(worker.context(), ExecContext::Scheduler);
    }

    #[test]
    fn counts_nest() {
        let registry = registry();
        let worker = registry.register().unwrap();
        worker.acquire_count();
        worker.acquire_count();
        assert_eq!(worker.release_count(), 1);
        assert_eq!(worker.release_count(), 0);
    }

    #[test]
    #[should_panic(expected = "unlock: lock count went negative")]
    fn unmatched_release_count_is_fatal() {
        let registry = registry();
        let worker = registry.register().unwrap();
        worker.release_count();
    }

    #[test]
    #[should_panic(expected = "exited while holding 1 lock(s)")]
    fn exit_with_locks_is_fatal() {
        let registry = registry();
        let worker = registry.register().unwrap();
        worker.acquire_count();
        drop(worker);
    }

    #[test]
    #[should_panic(expected = "requires Scheduler")]
    fn wrong_context_is_fatal() {
        let registry = registry();
        let worker = registry.register().unwrap();
        let _task = worker.enter_task();
        worker.expect_context(ExecContext::Scheduler, "test");
    }
}

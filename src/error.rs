use crate::{runtime::ExecContext, sync::LockId, WorkerId};
use thiserror::Error;

/// A broken invariant in one of the lock words or a worker's bookkeeping.
///
/// None of these can be recovered from: the shared state is already
/// inconsistent by the time they are detected. They are reported through
/// [`Hooks::fatal`](crate::Hooks::fatal), which aborts by default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fatal {
    #[error("lock: lock count is negative ({count}) on worker {worker}")]
    LockCount { worker: WorkerId, count: isize },

    #[error("unlock: lock count went negative on worker {worker}")]
    UnlockCount { worker: WorkerId },

    #[error("unlock: {lock:?} released by worker {worker} while not locked")]
    NotLocked { worker: WorkerId, lock: LockId },

    #[error("note wakeup: double wakeup")]
    DoubleWakeup,

    #[error("note sleep: waiter out of sync (observed {observed:#x})")]
    NoteOutOfSync { observed: usize },

    #[error("note sleep: unexpected waiter {observed:#x}, semaphore out of sync")]
    UnexpectedWaiter { observed: usize },

    #[error("note sleep: unable to acquire semaphore on worker {worker}, semaphore out of sync")]
    SemaphoreOutOfSync { worker: WorkerId },

    #[error("{op} called from {actual:?} context, requires {expected:?}")]
    WrongContext {
        op: &'static str,
        expected: ExecContext,
        actual: ExecContext,
    },

    #[error("worker {worker} exited while holding {count} lock(s)")]
    LocksHeldOnExit { worker: WorkerId, count: isize },
}

/// Errors from claiming a worker slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("all {capacity} worker slots are in use")]
    Exhausted { capacity: usize },
}

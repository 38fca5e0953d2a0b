use super::{Backoff, Phase};
use crate::{Fatal, Worker, WorkerId};
use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};
use tracing::trace;

const UNLOCKED: usize = 0;
const LOCKED: usize = 1 << 0;
const QUEUE_MASK: usize = !LOCKED;

/// Identity of a [`HybridMutex`], as reported to the hooks.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct LockId(usize);

impl fmt::Debug for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockId({:#x})", self.0)
    }
}

/// A mutex whose entire state, including its wait queue, is one word.
///
/// Bit 0 is the lock flag. The remaining bits hold the key of the worker at
/// the head of a stack of parked waiters, each linking to the next through
/// its slot's `next_wait`. Acquiring is a single CAS when uncontended;
/// otherwise the caller spins, yields and finally parks on its semaphore.
///
/// No fairness is provided: spinners and fresh callers may take the lock
/// ahead of parked waiters whenever it is observed free.
#[derive(Default)]
pub struct HybridMutex {
    key: AtomicUsize,
}

impl fmt::Debug for HybridMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key.load(Ordering::Relaxed);
        f.debug_struct("HybridMutex")
            .field("locked", &(key & LOCKED != 0))
            .field("head", &WorkerId::from_key(key & QUEUE_MASK))
            .finish()
    }
}

impl HybridMutex {
    /// Creates an unlocked mutex with no waiters.
    pub const fn new() -> Self {
        Self {
            key: AtomicUsize::new(UNLOCKED),
        }
    }

    /// The mutex's address, passed to the contention and unlock hooks.
    pub fn id(&self) -> LockId {
        LockId(self as *const Self as usize)
    }

    /// Whether some worker currently owns the lock. Advisory only.
    pub fn is_locked(&self) -> bool {
        self.key.load(Ordering::Relaxed) & LOCKED != 0
    }

    /// Whether any worker is parked waiting for the lock. Advisory only.
    pub fn is_contended(&self) -> bool {
        self.key.load(Ordering::Relaxed) > LOCKED
    }

    /// Takes the lock only if it is free, without spinning or parking.
    ///
    /// The worker's hold count is bumped only when this returns true.
    pub fn try_acquire(&self, worker: &Worker<'_>) -> bool {
        let acquired = self
            .key
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if acquired {
            worker.acquire_count();
        }
        acquired
    }

    /// Acquires the lock, escalating from spinning to parking under contention.
    pub fn acquire(&self, worker: &Worker<'_>) {
        worker.acquire_count();

        if self
            .key
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.acquire_slow(worker);
        }
    }

    /// Acquires the lock, releasing it when the guard is dropped.
    pub fn lock<'m, 'a>(&'m self, worker: &'m Worker<'a>) -> MutexGuard<'m, 'a> {
        self.acquire(worker);
        MutexGuard {
            mutex: self,
            worker,
        }
    }

    #[cold]
    fn acquire_slow(&self, worker: &Worker<'_>) {
        let registry = worker.registry();
        registry.ensure_semaphore(worker.id());

        let started = Instant::now();
        let mut backoff = Backoff::new(registry.config());

        'contend: loop {
            let mut key = self.key.load(Ordering::Relaxed);
            if key & LOCKED == UNLOCKED {
                match self.key.compare_exchange(
                    key,
                    key | LOCKED,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(_) => backoff.reset(),
                }
            }

            if backoff.snooze() != Phase::Park {
                continue;
            }

            // Push ourselves on the wait stack, giving up on parking if the
            // lock is released in the meantime.
            let slot = worker.slot();
            loop {
                if key & LOCKED == UNLOCKED {
                    continue 'contend;
                }

                slot.next_wait.store(key & QUEUE_MASK, Ordering::Relaxed);
                match self.key.compare_exchange(
                    key,
                    worker.id().key() | LOCKED,
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(actual) => key = actual,
                }
            }

            // Once linked into the word only a releaser can unlink us, and it
            // hands the lock over when it does. Stray posts are parked through.
            trace!(worker = %worker.id(), lock = ?self.id(), "parking on contended lock");
            while !slot.handoff.swap(false, Ordering::Acquire) {
                worker.park(None);
            }
            break;
        }

        registry
            .hooks()
            .on_contended(worker.id(), self.id(), started.elapsed());
    }

    pub fn release(&self, worker: &Worker<'_>) {
        let registry = worker.registry();

        loop {
            let key = self.key.load(Ordering::Acquire);
            match (key & LOCKED != 0, WorkerId::from_key(key & QUEUE_MASK)) {
                (false, _) => registry.fatal(Fatal::NotLocked {
                    worker: worker.id(),
                    lock: self.id(),
                }),
                (true, None) => {
                    if self
                        .key
                        .compare_exchange(LOCKED, UNLOCKED, Ordering::Release, Ordering::Relaxed)
                        .is_ok()
                    {
                        break;
                    }
                }
                (true, Some(head)) => {
                    // Pop the head but keep the lock bit set: ownership passes
                    // straight to the woken waiter so a fresh acquire can't
                    // slip in between the wakeup and its retry.
                    let waiter = registry.slot(head);
                    let next = waiter.next_wait.load(Ordering::Relaxed);
                    if self
                        .key
                        .compare_exchange(key, next | LOCKED, Ordering::AcqRel, Ordering::Relaxed)
                        .is_ok()
                    {
                        trace!(worker = %worker.id(), waiter = %head, lock = ?self.id(), "handing off lock");
                        waiter.handoff.store(true, Ordering::Release);
                        registry.unpark(head);
                        break;
                    }
                }
            }
        }

        registry.hooks().on_unlock(worker.id(), self.id());
        if worker.release_count() == 0 && worker.preempt_pending() {
            registry.hooks().restore_preempt(worker.id());
        }
    }
}

/// Releases its [`HybridMutex`] on drop.
#[must_use = "if unused the HybridMutex will immediately unlock"]
pub struct MutexGuard<'m, 'a> {
    mutex: &'m HybridMutex,
    worker: &'m Worker<'a>,
}

impl fmt::Debug for MutexGuard<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexGuard")
            .field("lock", &self.mutex.id())
            .field("worker", &self.worker.id())
            .finish()
    }
}

impl Drop for MutexGuard<'_, '_> {
    fn drop(&mut self) {
        self.mutex.release(self.worker);
    }
}

use crate::{ExecContext, Fatal, Registry, Worker, WorkerId};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};
use tracing::trace;

const UNARMED: usize = 0;
const FIRED: usize = 1;

/// Decoded view of a [`OneShotNote`] word.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NoteState {
    Unarmed,
    Registered(WorkerId),
    Fired,
}

impl From<usize> for NoteState {
    fn from(value: usize) -> Self {
        match value {
            FIRED => Self::Fired,
            key => WorkerId::from_key(key).map_or(Self::Unarmed, Self::Registered),
        }
    }
}

impl From<NoteState> for usize {
    fn from(state: NoteState) -> Self {
        match state {
            NoteState::Unarmed => UNARMED,
            NoteState::Registered(worker) => worker.key(),
            NoteState::Fired => FIRED,
        }
    }
}

/// A single-use wakeup with at most one sleeper.
///
/// The word is zero until either a worker registers itself to sleep on it
/// or [`wakeup`](Self::wakeup) fires it. Firing is permanent until
/// [`clear`](Self::clear), and firing twice is fatal.
#[derive(Debug, Default)]
pub struct OneShotNote {
    key: AtomicUsize,
}

impl OneShotNote {
    pub const fn new() -> Self {
        Self {
            key: AtomicUsize::new(UNARMED),
        }
    }

    /// Re-arms the note. Nobody may be sleeping on it.
    pub fn clear(&self) {
        self.key.store(UNARMED, Ordering::Release);
    }

    pub fn state(&self) -> NoteState {
        NoteState::from(self.key.load(Ordering::Acquire))
    }

    pub fn is_fired(&self) -> bool {
        self.state() == NoteState::Fired
    }

    /// Fires the note, waking the registered sleeper if there is one.
    pub fn wakeup(&self, registry: &Registry) {
        let previous = self.key.swap(FIRED, Ordering::AcqRel);
        match NoteState::from(previous) {
            NoteState::Unarmed => {}
            NoteState::Fired => registry.fatal(Fatal::DoubleWakeup),
            NoteState::Registered(waiter) => {
                trace!(waiter = %waiter, "note fired with sleeper");
                registry.unpark(waiter);
            }
        }
    }

    /// Sleeps until the note is fired. Must run in the scheduler context.
    pub fn sleep(&self, worker: &Worker<'_>) {
        worker.expect_context(ExecContext::Scheduler, "OneShotNote::sleep");
        self.wait(worker, None);
    }

    /// Sleeps until the note is fired or `timeout` elapses, returning
    /// whether it was fired. Must run in the scheduler context.
    pub fn timed_sleep(&self, worker: &Worker<'_>, timeout: Duration) -> bool {
        worker.expect_context(ExecContext::Scheduler, "OneShotNote::timed_sleep");
        self.wait(worker, Some(timeout))
    }

    /// Like [`timed_sleep`](Self::timed_sleep) but called from a task.
    ///
    /// The wait is bracketed by [`Hooks::enter_blocking`] and
    /// [`Hooks::exit_blocking`] so the scheduler can hand the worker's
    /// other work elsewhere. `None` waits without a deadline.
    ///
    /// [`Hooks::enter_blocking`]: crate::Hooks::enter_blocking
    /// [`Hooks::exit_blocking`]: crate::Hooks::exit_blocking
    pub fn timed_sleep_blocking(&self, worker: &Worker<'_>, timeout: Option<Duration>) -> bool {
        worker.expect_context(ExecContext::Task, "OneShotNote::timed_sleep_blocking");

        let hooks = worker.registry().hooks();
        hooks.enter_blocking(worker.id());
        let fired = self.wait(worker, timeout);
        hooks.exit_blocking(worker.id());
        fired
    }

    fn register(&self, worker: &Worker<'_>) -> bool {
        let registry = worker.registry();
        registry.ensure_semaphore(worker.id());

        match self.key.compare_exchange(
            UNARMED,
            worker.id().key(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(FIRED) => false,
            Err(observed) => registry.fatal(Fatal::NoteOutOfSync { observed }),
        }
    }

    fn wait(&self, worker: &Worker<'_>, timeout: Option<Duration>) -> bool {
        if !self.register(worker) {
            return true;
        }

        let registry = worker.registry();
        let interval = registry.config().intercept_interval;
        let intercept = registry.interceptor();

        let deadline = match timeout.and_then(|timeout| Instant::now().checked_add(timeout)) {
            Some(deadline) => deadline,
            None => {
                match intercept {
                    None => {
                        worker.park(None);
                    }
                    Some(intercept) => loop {
                        match Instant::now().checked_add(interval) {
                            Some(slice) => {
                                if worker.park(Some(slice)) {
                                    break;
                                }
                            }
                            None => {
                                worker.park(None);
                                break;
                            }
                        }
                        intercept();
                    },
                }
                return true;
            }
        };

        loop {
            let until = match intercept {
                Some(_) => Instant::now()
                    .checked_add(interval)
                    .map_or(deadline, |slice| slice.min(deadline)),
                None => deadline,
            };

            // A successful park means wakeup() already replaced our key.
            if worker.park(Some(until)) {
                return true;
            }
            if let Some(intercept) = intercept {
                intercept();
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        self.unregister(worker)
    }

    /// Backs out of a timed wait. A wakeup that raced the deadline has
    /// already posted our semaphore, so it is consumed and reported instead.
    #[cold]
    fn unregister(&self, worker: &Worker<'_>) -> bool {
        let registry = worker.registry();
        let me = worker.id().key();

        loop {
            match self.key.load(Ordering::Acquire) {
                key if key == me => {
                    if self
                        .key
                        .compare_exchange(me, UNARMED, Ordering::Acquire, Ordering::Relaxed)
                        .is_ok()
                    {
                        trace!(worker = %worker.id(), "note wait timed out");
                        return false;
                    }
                }
                FIRED => {
                    trace!(worker = %worker.id(), "note fired during timeout");
                    if !worker.park(None) {
                        registry.fatal(Fatal::SemaphoreOutOfSync {
                            worker: worker.id(),
                        });
                    }
                    return true;
                }
                observed => registry.fatal(Fatal::UnexpectedWaiter { observed }),
            }
        }
    }
}

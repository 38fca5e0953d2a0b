use super::{parker::Semaphore, Builder, Config, Hooks, NoHooks, Worker};
use crate::{sync::CachePadded, Fatal, RegistryError};
use std::{
    fmt,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, AtomicIsize, AtomicU64, AtomicUsize, Ordering},
        OnceLock,
    },
    time::Instant,
};
use tracing::{debug, error, trace};

pub(crate) type Interceptor = dyn Fn() + Send + Sync;

/// Identity of a claimed worker slot.
///
/// Encoded into lock and note words as `(index + 1) << 1`, which keeps bit 0
/// free for the lock flag and never collides with zero.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct WorkerId(NonZeroUsize);

impl WorkerId {
    fn from_index(index: usize) -> Self {
        let key = (index + 1) << 1;
        Self(NonZeroUsize::new(key).unwrap_or(NonZeroUsize::MIN))
    }

    pub(crate) fn from_key(key: usize) -> Option<Self> {
        debug_assert_eq!(key & 1, 0, "worker keys never carry the lock bit");
        NonZeroUsize::new(key).map(Self)
    }

    pub(crate) fn key(self) -> usize {
        self.0.get()
    }

    pub fn index(self) -> usize {
        (self.0.get() >> 1) - 1
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkerId").field(&self.index()).finish()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

/// Per-worker state: the waiter record threaded through lock words,
/// the scheduler's hold counter and preemption flag, and the semaphore.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    in_use: AtomicBool,
    pub(crate) next_wait: AtomicUsize,
    pub(crate) handoff: AtomicBool,
    pub(crate) blocked: AtomicBool,
    pub(crate) locks: AtomicIsize,
    pub(crate) preempt: AtomicBool,
    pub(crate) parks: AtomicU64,
    semaphore: OnceLock<Semaphore>,
}

impl Slot {
    fn reset(&self) {
        self.next_wait.store(0, Ordering::Relaxed);
        self.handoff.store(false, Ordering::Relaxed);
        self.blocked.store(false, Ordering::Relaxed);
        self.locks.store(0, Ordering::Relaxed);
        self.preempt.store(false, Ordering::Relaxed);
        self.parks.store(0, Ordering::Relaxed);
        if let Some(semaphore) = self.semaphore.get() {
            semaphore.drain();
        }
    }
}

/// Fixed-size table of worker slots plus the side-channel hooks.
///
/// All slots are allocated when the registry is built so that nothing on
/// the lock or note paths allocates.
pub struct Registry {
    slots: Box<[CachePadded<Slot>]>,
    config: Config,
    hooks: Box<dyn Hooks>,
    interceptor: Option<Box<Interceptor>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("capacity", &self.slots.len())
            .field("config", &self.config)
            .field("intercepting", &self.interceptor.is_some())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Registry {
    pub fn new(config: Config) -> Self {
        Self::from_parts(config, Box::new(NoHooks), None)
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_parts(
        config: Config,
        hooks: Box<dyn Hooks>,
        interceptor: Option<Box<Interceptor>>,
    ) -> Self {
        let slots = (0..config.max_workers.get())
            .map(|_| CachePadded::new(Slot::default()))
            .collect();

        Self {
            slots,
            config,
            hooks,
            interceptor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hooks(&self) -> &dyn Hooks {
        &*self.hooks
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claims a free slot for the calling thread.
    pub fn register(&self) -> Result<Worker<'_>, RegistryError> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .in_use
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                slot.reset();
                let id = WorkerId::from_index(index);
                debug!(worker = %id, "registered worker");
                return Ok(Worker::new(self, id));
            }
        }

        Err(RegistryError::Exhausted {
            capacity: self.slots.len(),
        })
    }

    pub(crate) fn unregister(&self, id: WorkerId) {
        debug!(worker = %id, "unregistered worker");
        self.slot(id).in_use.store(false, Ordering::Release);
    }

    pub(crate) fn slot(&self, id: WorkerId) -> &Slot {
        &self.slots[id.index()]
    }

    /// Creates the worker's semaphore if it does not have one yet.
    pub(crate) fn ensure_semaphore(&self, id: WorkerId) -> &Semaphore {
        self.slot(id).semaphore.get_or_init(Semaphore::default)
    }

    /// Blocks the owner of `id` on its semaphore until posted or `deadline`.
    pub(crate) fn park(&self, id: WorkerId, deadline: Option<Instant>) -> bool {
        let slot = self.slot(id);
        slot.parks.fetch_add(1, Ordering::Relaxed);
        trace!(worker = %id, bounded = deadline.is_some(), "parking");
        self.ensure_semaphore(id).wait(deadline)
    }

    /// Posts the semaphore of `id`, waking a pending or future park.
    pub fn unpark(&self, id: WorkerId) {
        trace!(worker = %id, "unparking");
        self.ensure_semaphore(id).post();
    }

    /// Whether `id` is currently parked inside a lock or note wait.
    pub fn is_blocked(&self, id: WorkerId) -> bool {
        self.slot(id).blocked.load(Ordering::Relaxed)
    }

    pub(crate) fn interceptor(&self) -> Option<&Interceptor> {
        self.interceptor.as_deref()
    }

    #[cold]
    pub(crate) fn fatal(&self, err: Fatal) -> ! {
        error!(error = %err, "fatal lock invariant violation");
        self.hooks.fatal(&err)
    }
}

use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
};

static CPU_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Number of logical processors, cached after the first lookup.
#[inline]
pub(crate) fn get() -> NonZeroUsize {
    NonZeroUsize::new(CPU_COUNT.load(Ordering::Relaxed)).unwrap_or_else(get_slow)
}

#[cold]
fn get_slow() -> NonZeroUsize {
    let cpu_count = NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN);
    CPU_COUNT.store(cpu_count.get(), Ordering::Relaxed);
    cpu_count
}

#![allow(dead_code)]

use semalock::{Config, Fatal, Hooks, LockId, Registry, WorkerId};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Counts side-channel events and panics on fatal errors so tests can
/// observe them with `#[should_panic]`.
#[derive(Debug, Default)]
pub struct TestHooks {
    pub contended: AtomicUsize,
    pub unlocks: AtomicUsize,
    pub preempts: AtomicUsize,
}

impl TestHooks {
    pub fn contended(&self) -> usize {
        self.contended.load(Ordering::SeqCst)
    }

    pub fn unlocks(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }

    pub fn preempts(&self) -> usize {
        self.preempts.load(Ordering::SeqCst)
    }
}

impl Hooks for TestHooks {
    fn on_contended(&self, _worker: WorkerId, _lock: LockId, _waited: Duration) {
        self.contended.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unlock(&self, _worker: WorkerId, _lock: LockId) {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
    }

    fn restore_preempt(&self, _worker: WorkerId) {
        self.preempts.fetch_add(1, Ordering::SeqCst);
    }

    fn fatal(&self, error: &Fatal) -> ! {
        panic!("fatal: {}", error)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

pub fn registry(config: Config) -> (Registry, Arc<TestHooks>) {
    init_tracing();
    let hooks = Arc::new(TestHooks::default());
    let registry = Registry::builder()
        .config(config)
        .hooks(hooks.clone())
        .build();
    (registry, hooks)
}

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

//! Scheduler-level locking built from a single atomic word per primitive.
//!
//! [`HybridMutex`] escalates from a CAS fast path through spinning and
//! yielding to parking the calling worker on its OS semaphore, threading
//! the wait list through the lock word itself. [`OneShotNote`] is a
//! single-use wakeup flag with blocking and deadline based waits.
//!
//! Both operate on behalf of a [`Worker`] claimed from a [`Registry`],
//! which owns every worker's waiter record, hold counter and semaphore.

mod error;
pub mod runtime;
pub mod sync;

pub use self::error::{Fatal, RegistryError};
pub use self::runtime::{
    Builder, Config, ExecContext, Hooks, NoHooks, Registry, TaskGuard, Worker, WorkerId,
};
pub use self::sync::{HybridMutex, LockId, MutexGuard, NoteState, OneShotNote};

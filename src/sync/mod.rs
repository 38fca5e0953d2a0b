mod cache_padded;
pub(crate) mod concurrency;
mod mutex;
mod note;
mod spin;

pub(crate) use self::cache_padded::CachePadded;
pub use self::mutex::{HybridMutex, LockId, MutexGuard};
pub use self::note::{NoteState, OneShotNote};
pub use self::spin::{Backoff, Phase};

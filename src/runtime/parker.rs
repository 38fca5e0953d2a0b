use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// Counting semaphore a single worker parks on.
///
/// Posts are never lost: a `post` before the matching `wait` is consumed by
/// that wait without blocking.
#[derive(Debug, Default)]
pub(crate) struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub(crate) fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        drop(count);
        self.cond.notify_one();
    }

    /// Discards any posts nobody waited for.
    pub(crate) fn drain(&self) {
        *self.count.lock() = 0;
    }

    /// Consumes one post, blocking until `deadline` if none is available.
    /// Returns false if the deadline passed first.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> bool {
        let mut count = self.count.lock();
        loop {
            if *count > 0 {
                *count -= 1;
                return true;
            }

            match deadline {
                None => self.cond.wait(&mut count),
                Some(deadline) => {
                    if self.cond.wait_until(&mut count, deadline).timed_out() {
                        if *count > 0 {
                            *count -= 1;
                            return true;
                        }
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn post_before_wait() {
        let sema = Semaphore::default();
        sema.post();
        assert!(sema.wait(None));
        assert!(!sema.wait(Some(Instant::now())));
    }

    #[test]
    fn drain_discards_posts() {
        let sema = Semaphore::default();
        sema.post();
        sema.post();
        sema.drain();
        assert!(!sema.wait(Some(Instant::now())));
    }

    #[test]
    fn wait_times_out_after_deadline() {
        let sema = Semaphore::default();
        let timeout = Duration::from_millis(20);
        let started = Instant::now();
        assert!(!sema.wait(Some(started + timeout)));
        assert!(started.elapsed() >= timeout);
    }

    #[test]
    fn post_wakes_waiter() {
        let sema = Semaphore::default();
        thread::scope(|s| {
            s.spawn(|| assert!(sema.wait(None)));
            thread::sleep(Duration::from_millis(10));
            sema.post();
        });
    }
}

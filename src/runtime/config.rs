use crate::sync::concurrency;
use std::{num::NonZeroUsize, time::Duration};

/// Tuning for the worker registry and the lock escalation policy.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) max_workers: NonZeroUsize,
    pub(crate) cpu_count: NonZeroUsize,
    pub(crate) active_spin: u32,
    pub(crate) active_spin_cnt: u32,
    pub(crate) passive_spin: u32,
    pub(crate) intercept_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    const DEFAULT_MAX_WORKERS: NonZeroUsize = match NonZeroUsize::new(256) {
        Some(n) => n,
        None => unreachable!(),
    };

    pub fn new() -> Self {
        Self {
            max_workers: Self::DEFAULT_MAX_WORKERS,
            cpu_count: concurrency::get(),
            active_spin: 4,
            active_spin_cnt: 30,
            passive_spin: 1,
            intercept_interval: Duration::from_millis(10),
        }
    }

    /// Number of worker slots allocated up front by the registry.
    pub fn max_workers(&mut self, max_workers: NonZeroUsize) -> &mut Self {
        self.max_workers = max_workers;
        self
    }

    /// Overrides the detected processor count.
    ///
    /// Setting this to one disables active spinning so contended acquires
    /// go straight to yielding and parking.
    pub fn cpu_count(&mut self, cpu_count: NonZeroUsize) -> &mut Self {
        self.cpu_count = cpu_count;
        self
    }

    /// Rounds of busy waiting before yielding, on multi-processor systems.
    pub fn active_spin(&mut self, rounds: u32) -> &mut Self {
        self.active_spin = rounds;
        self
    }

    /// Spin hints issued per active spin round.
    pub fn active_spin_cnt(&mut self, hints: u32) -> &mut Self {
        self.active_spin_cnt = hints;
        self
    }

    /// Rounds of OS yielding before parking.
    pub fn passive_spin(&mut self, rounds: u32) -> &mut Self {
        self.passive_spin = rounds;
        self
    }

    /// Longest single park while an interceptor is installed.
    pub fn intercept_interval(&mut self, interval: Duration) -> &mut Self {
        self.intercept_interval = interval;
        self
    }

    pub fn spin_enabled(&self) -> bool {
        self.cpu_count.get() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.max_workers.get(), 256);
        assert_eq!(
            (config.active_spin, config.active_spin_cnt, config.passive_spin),
            (4, 30, 1)
        );
        assert_eq!(config.intercept_interval, Duration::from_millis(10));
    }

    #[test]
    fn single_core_disables_spinning() {
        let mut config = Config::new();
        config.cpu_count(NonZeroUsize::MIN);
        assert!(!config.spin_enabled());

        config.cpu_count(NonZeroUsize::new(8).unwrap());
        assert!(config.spin_enabled());
    }
}

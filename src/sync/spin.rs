use crate::Config;
use std::{hint::spin_loop, thread};

/// Stage of a contended acquire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Busy wait on the processor.
    Spin,
    /// Give the rest of the time slice back to the OS.
    Yield,
    /// Spinning and yielding are exhausted; queue up and park.
    Park,
}

/// Escalation from spinning to yielding to parking.
///
/// Spinning is skipped entirely on single processor systems where the
/// lock holder cannot make progress while we spin.
#[derive(Clone, Debug)]
pub struct Backoff {
    counter: u32,
    active_spin: u32,
    active_spin_cnt: u32,
    passive_spin: u32,
}

impl Backoff {
    pub fn new(config: &Config) -> Self {
        Self {
            counter: 0,
            active_spin: if config.spin_enabled() {
                config.active_spin
            } else {
                0
            },
            active_spin_cnt: config.active_spin_cnt,
            passive_spin: config.passive_spin,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.counter < self.active_spin {
            Phase::Spin
        } else if self.counter < self.active_spin.saturating_add(self.passive_spin) {
            Phase::Yield
        } else {
            Phase::Park
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Runs one round of the current phase and advances.
    ///
    /// Returns the phase that ran. Once at [`Phase::Park`] nothing runs and
    /// the caller is expected to park, then [`reset`](Self::reset).
    pub fn snooze(&mut self) -> Phase {
        let phase = self.phase();
        match phase {
            Phase::Spin => (0..self.active_spin_cnt).for_each(|_| spin_loop()),
            Phase::Yield => thread::yield_now(),
            Phase::Park => return phase,
        }

        self.counter += 1;
        phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::num::NonZeroUsize;

    fn phases(config: &Config, rounds: usize) -> Vec<Phase> {
        let mut backoff = Backoff::new(config);
        (0..rounds).map(|_| backoff.snooze()).collect()
    }

    #[rstest]
    #[case(4, 1, 4)]
    #[case(2, 3, 2)]
    #[case(0, 1, 0)]
    fn escalates_spin_yield_park(#[case] spin: u32, #[case] passive: u32, #[case] spins: usize) {
        let mut config = Config::new();
        config
            .cpu_count(NonZeroUsize::new(4).unwrap())
            .active_spin(spin)
            .active_spin_cnt(1)
            .passive_spin(passive);

        let rounds = spins + passive as usize;
        let seen = phases(&config, rounds + 2);
        assert!(seen[..spins].iter().all(|&p| p == Phase::Spin));
        assert!(seen[spins..rounds].iter().all(|&p| p == Phase::Yield));
        assert_eq!(&seen[rounds..], &[Phase::Park, Phase::Park]);
    }

    #[test]
    fn single_core_never_spins() {
        let mut config = Config::new();
        config.cpu_count(NonZeroUsize::MIN).passive_spin(1);
        assert_eq!(phases(&config, 2), vec![Phase::Yield, Phase::Park]);
    }

    #[test]
    fn reset_restarts_escalation() {
        let mut config = Config::new();
        config.cpu_count(NonZeroUsize::new(2).unwrap()).active_spin(1).passive_spin(0);

        let mut backoff = Backoff::new(&config);
        assert_eq!(backoff.snooze(), Phase::Spin);
        assert_eq!(backoff.snooze(), Phase::Park);
        backoff.reset();
        assert_eq!(backoff.phase(), Phase::Spin);
    }
}

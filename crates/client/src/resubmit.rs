//! Resubmission cadence for un-acknowledged submissions.

use std::time::Duration;

use rand::Rng;

/// How long to wait for results before resending everything pending.
///
/// The wait scales with the number of pending records: `per_job_wait`
/// each before the first sweep, `per_job_wait * later_multiplier` each
/// after it. Resends within one sweep are spaced by a random jitter of
/// up to `max_jitter`.
#[derive(Debug, Clone)]
pub struct ResubmitSchedule {
    pub per_job_wait: Duration,
    pub later_multiplier: u32,
    pub max_jitter: Duration,
}

impl Default for ResubmitSchedule {
    fn default() -> Self {
        Self {
            per_job_wait: Duration::from_secs(10),
            later_multiplier: 2,
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl ResubmitSchedule {
    /// Wait before the next sweep, given `pending` records and the number
    /// of sweeps already done.
    pub fn wait_before_sweep(&self, pending: usize, sweeps_done: u32) -> Duration {
        let per_job = if sweeps_done == 0 {
            self.per_job_wait
        } else {
            self.per_job_wait * self.later_multiplier
        };
        per_job * u32::try_from(pending).unwrap_or(u32::MAX)
    }

    /// A random pause to put between two resends.
    pub fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_wait_is_ten_seconds_per_pending_job() {
        let schedule = ResubmitSchedule::default();
        assert_eq!(schedule.wait_before_sweep(3, 0), Duration::from_secs(30));
    }

    #[test]
    fn later_waits_double() {
        let schedule = ResubmitSchedule::default();
        assert_eq!(schedule.wait_before_sweep(3, 1), Duration::from_secs(60));
        assert_eq!(schedule.wait_before_sweep(3, 4), Duration::from_secs(60));
    }

    #[test]
    fn nothing_pending_means_no_wait() {
        assert_eq!(ResubmitSchedule::default().wait_before_sweep(0, 0), Duration::ZERO);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let schedule = ResubmitSchedule::default();
        for _ in 0..100 {
            assert!(schedule.jitter() <= schedule.max_jitter);
        }
    }

    #[test]
    fn zero_jitter_bound_gives_zero() {
        let schedule = ResubmitSchedule {
            max_jitter: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(schedule.jitter(), Duration::ZERO);
    }
}

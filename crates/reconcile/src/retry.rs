//! Backoff schedules
//!
//! A schedule is the list of waits between attempts: one initial attempt,
//! then one retry per entry. Schedules are executed by `tokio_retry`, which
//! accepts any iterator of durations as its strategy.

use std::time::Duration;

/// Waits between successive attempts of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// `retries` waits, each twice the previous, starting at `initial`.
    /// Waits saturate at `Duration::MAX`, so the schedule always has `retries` entries.
    pub fn doubling(initial: Duration, retries: usize) -> Self {
        let delays = std::iter::successors(Some(initial), |d| Some(d.saturating_mul(2)))
            .take(retries)
            .collect();
        Self { delays }
    }

    /// Location provisioning: 10s, 20s, 40s, 80s, 160s, 320s
    pub fn location_provisioning() -> Self {
        Self::doubling(Duration::from_secs(10), 6)
    }

    /// Rate limits and dropped connections: 2s, 4s, 8s
    pub fn transient_http() -> Self {
        Self::doubling(Duration::from_secs(2), 3)
    }

    /// No retries at all
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Sum of all waits, or `None` when it does not fit in a `Duration`
    pub fn checked_total_wait(&self) -> Option<Duration> {
        self.delays
            .iter()
            .try_fold(Duration::ZERO, |total, d| total.checked_add(*d))
    }

    pub fn total_wait(&self) -> Duration {
        self.checked_total_wait().unwrap_or(Duration::MAX)
    }

    /// Strategy iterator handed to `tokio_retry`
    pub fn strategy(&self) -> std::vec::IntoIter<Duration> {
        self.delays.clone().into_iter()
    }
}

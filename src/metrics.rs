//! Authoritative counter sampling and run statistics.

use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dispatcher::RunOutcome;
use crate::error::MetricUnavailable;
use crate::target::ClickTarget;

/// Samples the authoritative counter and derives progress from it.
///
/// Purely derived state: only the initial anchor and the last sample are
/// kept. A failed re-sample leaves the last value in place so the caller can
/// simply retry next round.
pub struct MetricTracker {
    target: Arc<dyn ClickTarget>,
    client: Client,
    initial: u64,
    latest: u64,
}

impl MetricTracker {
    /// Take the first sample and anchor all deltas to it.
    pub async fn start(
        target: Arc<dyn ClickTarget>,
        sample_timeout: Duration,
    ) -> Result<Self, MetricUnavailable> {
        let client = Client::builder().timeout(sample_timeout).build()?;
        let initial = target.sample(&client).await?;
        Ok(Self {
            target,
            client,
            initial,
            latest: initial,
        })
    }

    /// Re-read the counter.
    pub async fn sample(&mut self) -> Result<u64, MetricUnavailable> {
        let value = self.target.sample(&self.client).await?;
        debug!("counter sampled: {} (initial {})", value, self.initial);
        self.latest = value;
        Ok(value)
    }

    pub fn initial(&self) -> u64 {
        self.initial
    }

    pub fn latest(&self) -> u64 {
        self.latest
    }

    /// Counter growth since the run started.
    pub fn delta(&self) -> u64 {
        self.latest.saturating_sub(self.initial)
    }

    /// Counter growth per second over `elapsed`.
    pub fn rate(&self, elapsed: Duration) -> f64 {
        if elapsed.is_zero() {
            return 0.0;
        }
        self.delta() as f64 / elapsed.as_secs_f64()
    }
}

/// Cumulative counters for one boosting run.
///
/// Owned by the run controller; the dispatcher folds attempt outcomes into
/// it on its driver task only, so the attempt total always equals
/// successes plus failures.
#[derive(Debug)]
pub struct RunStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    started_at: Instant,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            successes: 0,
            failures: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record_success(&mut self) {
        self.attempts += 1;
        self.successes += 1;
    }

    pub fn record_failure(&mut self) {
        self.attempts += 1;
        self.failures += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Share of attempts that succeeded, as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64 * 100.0
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Final report for a completed or aborted run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub initial_count: u64,
    pub final_count: u64,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub elapsed: Duration,
    /// Endpoints still alive in the pool when the run ended.
    pub active_endpoints: usize,
}

impl RunSummary {
    /// Total counter increase over the run.
    pub fn increase(&self) -> u64 {
        self.final_count.saturating_sub(self.initial_count)
    }

    /// Share of attempts that succeeded, as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_accounting_balances() {
        let mut stats = RunStats::new();
        for _ in 0..7 {
            stats.record_success();
        }
        for _ in 0..3 {
            stats.record_failure();
        }
        assert_eq!(stats.attempts, 10);
        assert_eq!(stats.successes + stats.failures, stats.attempts);
        assert!((stats.success_rate() - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_stats_rate_is_zero() {
        assert_eq!(RunStats::new().success_rate(), 0.0);
    }

    #[test]
    fn summary_increase_saturates() {
        let summary = RunSummary {
            outcome: RunOutcome::Completed,
            initial_count: 100,
            final_count: 90,
            attempts: 0,
            successes: 0,
            failures: 0,
            elapsed: Duration::from_secs(1),
            active_endpoints: 0,
        };
        assert_eq!(summary.increase(), 0);
    }

    #[test]
    fn summary_success_rate() {
        let summary = RunSummary {
            outcome: RunOutcome::Completed,
            initial_count: 0,
            final_count: 10,
            attempts: 4,
            successes: 3,
            failures: 1,
            elapsed: Duration::from_secs(2),
            active_endpoints: 5,
        };
        assert_eq!(summary.increase(), 10);
        assert!((summary.success_rate() - 75.0).abs() < f64::EPSILON);
    }
}

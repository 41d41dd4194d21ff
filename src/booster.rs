//! Run controller: acquire, validate, precondition-check, dispatch, report.

use log::{info, warn};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::BoostConfig;
use crate::dispatcher::{Dispatcher, StopHandle};
use crate::error::{BoostError, SourceUnavailable};
use crate::metrics::{MetricTracker, RunStats, RunSummary};
use crate::pool::ProxyPool;
use crate::progress::Progress;
use crate::proxy::Candidate;
use crate::source::ProxySource;
use crate::target::ClickTarget;
use crate::validator::Validator;

/// Orchestrates one boosting run end to end.
pub struct Booster {
    config: BoostConfig,
    source: Arc<dyn ProxySource>,
    target: Arc<dyn ClickTarget>,
    stop: StopHandle,
    progress: Option<UnboundedSender<Progress>>,
}

impl Booster {
    pub fn new(
        config: BoostConfig,
        source: Arc<dyn ProxySource>,
        target: Arc<dyn ClickTarget>,
    ) -> Self {
        Self {
            config,
            source,
            target,
            stop: StopHandle::new(),
            progress: None,
        }
    }

    /// Deliver progress events to `tx` during the run.
    pub fn with_progress(mut self, tx: UnboundedSender<Progress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Handle for requesting a cooperative stop from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run until the counter reaches `target_count` or a terminal condition.
    ///
    /// Fatal preconditions come back as `Err`; once dispatch has started,
    /// termination is reported through the summary's outcome together with
    /// the statistics accumulated so far.
    pub async fn run(&self, target_count: u64) -> Result<RunSummary, BoostError> {
        let candidates = self.source.fetch().await?;
        if candidates.is_empty() {
            return Err(SourceUnavailable("feed yielded no candidates".to_string()).into());
        }
        info!("fetched {} candidates", candidates.len());
        let candidates = cap_candidates(candidates, self.config.max_proxies);

        let validator = Validator::new(&self.config);
        let validated = validator.validate(candidates, self.progress.as_ref()).await;
        if validated.len() < self.config.min_proxies {
            return Err(BoostError::InsufficientProxies {
                validated: validated.len(),
                required: self.config.min_proxies,
            });
        }

        let pool = Arc::new(ProxyPool::with_endpoints(
            validated,
            self.config.max_proxies,
            self.config.max_penalties,
        ));

        let mut tracker =
            MetricTracker::start(Arc::clone(&self.target), self.config.sample_timeout).await?;
        info!(
            "initial counter value {}, boosting towards {}",
            tracker.initial(),
            target_count
        );

        let mut stats = RunStats::new();
        let dispatcher = Dispatcher::new(
            self.config.clone(),
            Arc::clone(&pool),
            Arc::clone(&self.source),
            Arc::clone(&self.target),
            self.stop.clone(),
            self.progress.clone(),
        );
        let outcome = dispatcher.run(target_count, &mut tracker, &mut stats).await;

        // best effort; the last in-run sample stands in if this fails
        if let Err(err) = tracker.sample().await {
            warn!("final counter sample failed: {}", err);
        }

        let summary = RunSummary {
            outcome,
            initial_count: tracker.initial(),
            final_count: tracker.latest(),
            attempts: stats.attempts,
            successes: stats.successes,
            failures: stats.failures,
            elapsed: stats.elapsed(),
            active_endpoints: pool.len(),
        };
        info!(
            "run finished: {:?}, +{} over {} attempts in {:?} ({:.2}/s)",
            summary.outcome,
            summary.increase(),
            summary.attempts,
            summary.elapsed,
            tracker.rate(summary.elapsed)
        );
        Ok(summary)
    }
}

/// Trim an oversized candidate list to the pool ceiling by random selection,
/// so the kept subset is not biased towards the head of the feed.
pub(crate) fn cap_candidates(mut candidates: Vec<Candidate>, max: usize) -> Vec<Candidate> {
    if candidates.len() > max {
        info!(
            "{} candidates exceed the {} ceiling, sampling randomly",
            candidates.len(),
            max
        );
        candidates.shuffle(&mut rand::rng());
        candidates.truncate(max);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_keeps_small_lists_intact() {
        let candidates = vec![Candidate::new("a", 1), Candidate::new("b", 2)];
        let capped = cap_candidates(candidates.clone(), 10);
        assert_eq!(capped, candidates);
    }

    #[test]
    fn cap_trims_to_ceiling() {
        let candidates: Vec<Candidate> =
            (0..100).map(|i| Candidate::new("h", 1000 + i)).collect();
        let capped = cap_candidates(candidates, 25);
        assert_eq!(capped.len(), 25);
    }
}

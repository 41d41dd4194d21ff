//! Concurrent reachability validation of relay candidates.

use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::BoostConfig;
use crate::progress::Progress;
use crate::proxy::{Candidate, ValidatedEndpoint};

/// Probes candidates through a bounded worker pool and keeps the ones that
/// answer in time.
///
/// Probes run fan-out/fan-in with no ordering guarantee, and the pass set is
/// inherently non-deterministic against live relays: the only guarantee is
/// one successful probe per returned endpoint at the instant it ran. A probe
/// that errors, times out or answers with a non-success status drops its
/// candidate silently; rescuing marginal relays is not worth retries when
/// the candidate pool is large.
#[derive(Clone)]
pub struct Validator {
    probe_url: String,
    timeout: Duration,
    concurrency: usize,
    progress_every: usize,
}

impl Validator {
    pub fn new(config: &BoostConfig) -> Self {
        Self {
            probe_url: config.probe_url.clone(),
            timeout: config.timeout,
            concurrency: config.concurrency.max(1),
            progress_every: config.progress_every.max(1),
        }
    }

    /// Probe every candidate and collect the reachable ones.
    ///
    /// Emits `Progress::Validating` every `progress_every` completions, plus
    /// a final event once all candidates are processed.
    pub async fn validate(
        &self,
        candidates: Vec<Candidate>,
        progress: Option<&UnboundedSender<Progress>>,
    ) -> Vec<ValidatedEndpoint> {
        let total = candidates.len();
        if total == 0 {
            return Vec::new();
        }
        info!(
            "validating {} candidates with {} workers",
            total, self.concurrency
        );
        let started = Instant::now();

        let mut validated = Vec::new();
        let mut processed = 0usize;
        let mut probes = stream::iter(candidates)
            .map(|candidate| self.probe(candidate))
            .buffer_unordered(self.concurrency);

        while let Some(result) = probes.next().await {
            processed += 1;
            if let Some(endpoint) = result {
                validated.push(endpoint);
            }
            if processed % self.progress_every == 0 || processed == total {
                if let Some(tx) = progress {
                    let _ = tx.send(Progress::Validating { processed, total });
                }
            }
        }

        info!(
            "validated {}/{} candidates in {:?}",
            validated.len(),
            total,
            started.elapsed()
        );
        validated
    }

    /// One probe: build a client through the candidate and fetch the probe
    /// URL within the deadline.
    async fn probe(&self, candidate: Candidate) -> Option<ValidatedEndpoint> {
        let proxy = candidate.to_reqwest_proxy().ok()?;
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .proxy(proxy)
            .build()
            .ok()?;

        let start = Instant::now();
        match client.get(&self.probe_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let latency = start.elapsed();
                debug!("candidate {} reachable in {:?}", candidate, latency);
                Some(ValidatedEndpoint::new(candidate, latency))
            }
            Ok(resp) => {
                debug!("candidate {} answered {}", candidate, resp.status());
                None
            }
            Err(err) => {
                debug!("candidate {} dropped: {}", candidate, err);
                None
            }
        }
    }
}

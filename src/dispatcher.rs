//! The rotating click loop.

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

use crate::config::BoostConfig;
use crate::metrics::{MetricTracker, RunStats};
use crate::pool::ProxyPool;
use crate::progress::Progress;
use crate::proxy::ValidatedEndpoint;
use crate::source::ProxySource;
use crate::target::ClickTarget;
use crate::validator::Validator;

/// Lifecycle of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Running,
    Replenishing,
    Completed,
    Aborted,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// The sampled counter reached the target.
    Completed,
    /// The loop stopped early.
    Aborted(AbortCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortCause {
    /// The pool emptied out and replenishment yielded nothing new.
    PoolExhausted,
    /// The cooperative stop signal was observed between ticks.
    Cancelled,
}

/// Outcome of a single dispatch tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
}

/// Cooperative stop signal, checked at tick boundaries only; an in-flight
/// request always finishes or times out first.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop at the next tick boundary.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives the rotating request loop over the pool.
///
/// `Idle → Running → (Replenishing) → Running → Completed | Aborted`
pub struct Dispatcher {
    config: BoostConfig,
    pool: Arc<ProxyPool>,
    source: Arc<dyn ProxySource>,
    target: Arc<dyn ClickTarget>,
    validator: Validator,
    /// Paces ticks so the loop cannot outrun the configured rate.
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
    state: Mutex<DispatchState>,
    stop: StopHandle,
    progress: Option<UnboundedSender<Progress>>,
}

impl Dispatcher {
    pub fn new(
        config: BoostConfig,
        pool: Arc<ProxyPool>,
        source: Arc<dyn ProxySource>,
        target: Arc<dyn ClickTarget>,
        stop: StopHandle,
        progress: Option<UnboundedSender<Progress>>,
    ) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.max_ticks_per_second.ceil() as u32)
                .unwrap_or(NonZeroU32::new(1).unwrap()),
        );
        let validator = Validator::new(&config);
        Self {
            config,
            pool,
            source,
            target,
            validator,
            limiter: RateLimiter::direct(quota),
            state: Mutex::new(DispatchState::Idle),
            stop,
            progress,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatchState {
        *self.state.lock()
    }

    /// Run the click loop until the sampled counter reaches `target_count`,
    /// the pool is exhausted beyond replenishment, or the stop signal fires.
    ///
    /// Attempt outcomes are folded into `stats` on this task only, so the
    /// attempt total always balances even with `in_flight > 1`.
    pub async fn run(
        &self,
        target_count: u64,
        tracker: &mut MetricTracker,
        stats: &mut RunStats,
    ) -> RunOutcome {
        if tracker.latest() >= target_count {
            info!(
                "counter already at {} (target {}), nothing to do",
                tracker.latest(),
                target_count
            );
            self.set_state(DispatchState::Completed);
            return RunOutcome::Completed;
        }

        self.set_state(DispatchState::Running);
        let in_flight_bound = self.config.in_flight.max(1);
        let mut in_flight: JoinSet<(String, AttemptOutcome)> = JoinSet::new();
        let mut next_sample = Instant::now() + self.config.round_time;
        let mut last_value = tracker.latest();
        let mut round_successes: u64 = 0;
        let mut current_delta = tracker.delta();
        // One barren replenishment per round; reaching it with an empty pool
        // is terminal.
        let mut replenish_barren = false;

        let outcome = loop {
            if self.stop.is_stopped() {
                info!("stop signal observed, winding down");
                break RunOutcome::Aborted(AbortCause::Cancelled);
            }

            // round boundary: re-read the authoritative counter
            if Instant::now() >= next_sample {
                match tracker.sample().await {
                    Ok(value) => {
                        current_delta = tracker.delta();
                        self.emit(Progress::Sampled {
                            value,
                            delta: current_delta,
                        });
                        if value >= target_count {
                            break RunOutcome::Completed;
                        }
                        let round_delta = value.saturating_sub(last_value);
                        if round_delta == 0 && round_successes > 0 {
                            warn!(
                                "low yield: {} hits this round but the counter stayed flat",
                                round_successes
                            );
                            self.emit(Progress::LowYield {
                                round_successes,
                                delta: current_delta,
                            });
                        }
                        last_value = value;
                    }
                    Err(err) => warn!("counter sample failed, retrying next round: {}", err),
                }
                round_successes = 0;
                replenish_barren = false;
                next_sample = Instant::now() + self.config.round_time;
            }

            // pool maintenance before further dispatch
            if self.pool.len() < self.config.min_available.max(1) {
                if self.pool.is_empty() && replenish_barren {
                    break RunOutcome::Aborted(AbortCause::PoolExhausted);
                }
                if !replenish_barren {
                    let added = self.replenish().await;
                    replenish_barren = added == 0;
                    if self.pool.is_empty() && replenish_barren {
                        break RunOutcome::Aborted(AbortCause::PoolExhausted);
                    }
                }
                if self.pool.is_empty() {
                    break RunOutcome::Aborted(AbortCause::PoolExhausted);
                }
            }

            self.limiter.until_ready().await;

            // reap whatever already finished, then respect the bound
            while let Some(joined) = in_flight.try_join_next() {
                self.absorb(joined, stats, &mut round_successes, current_delta);
            }
            while in_flight.len() >= in_flight_bound {
                if let Some(joined) = in_flight.join_next().await {
                    self.absorb(joined, stats, &mut round_successes, current_delta);
                }
            }

            match self.pool.select() {
                Ok(endpoint) => {
                    let target = Arc::clone(&self.target);
                    let timeout = self.config.timeout;
                    debug!("dispatching through {}", endpoint);
                    in_flight
                        .spawn(async move { (endpoint.key(), click_once(target, endpoint, timeout).await) });
                }
                // raced with an eviction; the next iteration replenishes
                Err(_) => continue,
            }
        };

        // let in-flight requests finish or time out before reporting
        while let Some(joined) = in_flight.join_next().await {
            self.absorb(joined, stats, &mut round_successes, current_delta);
        }

        match outcome {
            RunOutcome::Completed => self.set_state(DispatchState::Completed),
            RunOutcome::Aborted(cause) => {
                warn!("dispatch aborted: {:?}", cause);
                self.set_state(DispatchState::Aborted);
            }
        }
        outcome
    }

    /// Fold one finished attempt into the statistics and the pool.
    fn absorb(
        &self,
        joined: Result<(String, AttemptOutcome), tokio::task::JoinError>,
        stats: &mut RunStats,
        round_successes: &mut u64,
        current_delta: u64,
    ) {
        let Ok((key, outcome)) = joined else {
            return;
        };
        match outcome {
            AttemptOutcome::Success => {
                stats.record_success();
                *round_successes += 1;
                self.pool.reward(&key);
            }
            AttemptOutcome::Failure | AttemptOutcome::Timeout => {
                stats.record_failure();
                self.pool.penalize(&key);
            }
        }
        if stats.attempts % self.config.progress_every.max(1) as u64 == 0 {
            self.emit(Progress::Dispatching {
                attempts: stats.attempts,
                hits: stats.successes,
                delta: current_delta,
            });
        }
    }

    /// Refill the pool from the source. Fetch failures are tolerated here;
    /// they only matter if the pool is empty afterwards.
    async fn replenish(&self) -> usize {
        self.set_state(DispatchState::Replenishing);
        self.emit(Progress::Replenishing {
            pool_size: self.pool.len(),
        });

        let added = match self.source.fetch().await {
            Ok(candidates) if candidates.is_empty() => 0,
            Ok(candidates) => {
                let candidates =
                    crate::booster::cap_candidates(candidates, self.config.max_proxies);
                let fresh = self.validator.validate(candidates, self.progress.as_ref()).await;
                self.pool.replenish(fresh)
            }
            Err(err) => {
                warn!("replenishment fetch failed: {}", err);
                0
            }
        };

        self.emit(Progress::Replenished {
            added,
            pool_size: self.pool.len(),
        });
        self.set_state(DispatchState::Running);
        added
    }

    fn set_state(&self, next: DispatchState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!("dispatcher {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn emit(&self, event: Progress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }
}

/// One attempt: build a client through the endpoint and issue the countable
/// action within the deadline.
async fn click_once(
    target: Arc<dyn ClickTarget>,
    endpoint: ValidatedEndpoint,
    timeout: Duration,
) -> AttemptOutcome {
    let proxy = match endpoint.candidate.to_reqwest_proxy() {
        Ok(proxy) => proxy,
        Err(_) => return AttemptOutcome::Failure,
    };
    let client = match reqwest::Client::builder().timeout(timeout).proxy(proxy).build() {
        Ok(client) => client,
        Err(_) => return AttemptOutcome::Failure,
    };
    match target.click(&client).await {
        Ok(()) => AttemptOutcome::Success,
        Err(err) if err.is_timeout() => AttemptOutcome::Timeout,
        Err(_) => AttemptOutcome::Failure,
    }
}

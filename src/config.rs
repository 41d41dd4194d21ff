//! Configuration for a boosting run.

use std::time::Duration;

/// Configuration consumed by the core pipeline.
#[derive(Debug, Clone)]
pub struct BoostConfig {
    /// Deadline for a single probe or click request.
    pub timeout: Duration,
    /// Deadline for an authoritative counter sample.
    pub sample_timeout: Duration,
    /// Validator worker count.
    pub concurrency: usize,
    /// Interval between authoritative counter samples.
    pub round_time: Duration,
    /// Emit a progress event every this many probes or attempts.
    pub progress_every: usize,
    /// Pool ceiling; candidates beyond it are randomly sampled away.
    pub max_proxies: usize,
    /// Fatal-precondition floor: abort unless at least this many validate.
    pub min_proxies: usize,
    /// Replenishment trigger: refill once the pool thins below this.
    pub min_available: usize,
    /// Consecutive failures before an endpoint is evicted.
    pub max_penalties: u32,
    /// Concurrent in-flight clicks. 1 means strict sequencing; raising it
    /// trades detectability for throughput.
    pub in_flight: usize,
    /// Upper bound on dispatch ticks per second.
    pub max_ticks_per_second: f64,
    /// Lightweight reachability target probed through each candidate.
    pub probe_url: String,
}

impl BoostConfig {
    /// Create a new configuration builder.
    pub fn builder() -> BoostConfigBuilder {
        BoostConfigBuilder::new()
    }
}

impl Default for BoostConfig {
    fn default() -> Self {
        BoostConfigBuilder::new().build()
    }
}

/// Builder for `BoostConfig`.
pub struct BoostConfigBuilder {
    timeout: Option<Duration>,
    sample_timeout: Option<Duration>,
    concurrency: Option<usize>,
    round_time: Option<Duration>,
    progress_every: Option<usize>,
    max_proxies: Option<usize>,
    min_proxies: Option<usize>,
    min_available: Option<usize>,
    max_penalties: Option<u32>,
    in_flight: Option<usize>,
    max_ticks_per_second: Option<f64>,
    probe_url: Option<String>,
}

impl BoostConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            timeout: None,
            sample_timeout: None,
            concurrency: None,
            round_time: None,
            progress_every: None,
            max_proxies: None,
            min_proxies: None,
            min_available: None,
            max_penalties: None,
            in_flight: None,
            max_ticks_per_second: None,
            probe_url: None,
        }
    }

    /// Set the deadline for a single probe or click request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the deadline for an authoritative counter sample.
    pub fn sample_timeout(mut self, timeout: Duration) -> Self {
        self.sample_timeout = Some(timeout);
        self
    }

    /// Set the validator worker count.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = Some(workers);
        self
    }

    /// Set the interval between counter samples.
    pub fn round_time(mut self, interval: Duration) -> Self {
        self.round_time = Some(interval);
        self
    }

    /// Set the progress-report granularity.
    pub fn progress_every(mut self, count: usize) -> Self {
        self.progress_every = Some(count);
        self
    }

    /// Set the pool ceiling.
    pub fn max_proxies(mut self, count: usize) -> Self {
        self.max_proxies = Some(count);
        self
    }

    /// Set the minimum validated count required to start dispatching.
    pub fn min_proxies(mut self, count: usize) -> Self {
        self.min_proxies = Some(count);
        self
    }

    /// Set the pool size below which replenishment is triggered.
    pub fn min_available(mut self, count: usize) -> Self {
        self.min_available = Some(count);
        self
    }

    /// Set the consecutive-failure count that evicts an endpoint.
    pub fn max_penalties(mut self, count: u32) -> Self {
        self.max_penalties = Some(count);
        self
    }

    /// Set the concurrent in-flight click bound.
    pub fn in_flight(mut self, count: usize) -> Self {
        self.in_flight = Some(count);
        self
    }

    /// Set the upper bound on dispatch ticks per second.
    pub fn max_ticks_per_second(mut self, rate: f64) -> Self {
        self.max_ticks_per_second = Some(rate);
        self
    }

    /// Set the URL probed through each candidate during validation.
    pub fn probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = Some(url.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> BoostConfig {
        BoostConfig {
            timeout: self.timeout.unwrap_or(Duration::from_secs(3)),
            sample_timeout: self.sample_timeout.unwrap_or(Duration::from_secs(10)),
            concurrency: self.concurrency.unwrap_or(75),
            round_time: self.round_time.unwrap_or(Duration::from_secs(305)),
            progress_every: self.progress_every.unwrap_or(10),
            max_proxies: self.max_proxies.unwrap_or(10_000),
            min_proxies: self.min_proxies.unwrap_or(100),
            min_available: self.min_available.unwrap_or(3),
            max_penalties: self.max_penalties.unwrap_or(3),
            in_flight: self.in_flight.unwrap_or(1),
            max_ticks_per_second: self.max_ticks_per_second.unwrap_or(5.0),
            probe_url: self
                .probe_url
                .unwrap_or_else(|| "http://httpbin.org/ip".to_string()),
        }
    }
}

impl Default for BoostConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = BoostConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.concurrency, 75);
        assert_eq!(config.round_time, Duration::from_secs(305));
        assert_eq!(config.progress_every, 10);
        assert_eq!(config.max_proxies, 10_000);
        assert_eq!(config.min_proxies, 100);
        assert_eq!(config.min_available, 3);
        assert_eq!(config.max_penalties, 3);
        assert_eq!(config.in_flight, 1);
    }

    #[test]
    fn builder_overrides() {
        let config = BoostConfig::builder()
            .timeout(Duration::from_secs(1))
            .concurrency(8)
            .min_proxies(2)
            .in_flight(4)
            .probe_url("http://127.0.0.1:1/ip")
            .build();
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.min_proxies, 2);
        assert_eq!(config.in_flight, 4);
        assert_eq!(config.probe_url, "http://127.0.0.1:1/ip");
    }
}

//! Error types for the viewboost crate.

use thiserror::Error;

/// Error returned when no endpoint is available in the pool.
#[derive(Debug, Error)]
#[error("proxy pool exhausted")]
pub struct PoolExhausted;

/// Error returned when the candidate feed is unreachable or yields nothing usable.
#[derive(Debug, Error)]
#[error("proxy feed unavailable: {0}")]
pub struct SourceUnavailable(pub String);

impl From<reqwest::Error> for SourceUnavailable {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<std::io::Error> for SourceUnavailable {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// Error returned when the authoritative counter could not be read.
#[derive(Debug, Error)]
pub enum MetricUnavailable {
    /// The counter request itself failed or timed out.
    #[error("counter request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The counter endpoint answered, but not with a readable value.
    #[error("counter response malformed: {0}")]
    Malformed(String),
}

/// Fatal conditions that end a run before dispatch starts.
///
/// Mid-run termination is not an error: the dispatcher reports it through
/// the run outcome, together with the statistics accumulated so far.
#[derive(Debug, Error)]
pub enum BoostError {
    #[error(transparent)]
    Source(#[from] SourceUnavailable),
    /// Too few candidates survived validation to spread load safely.
    #[error("only {validated} proxies validated, at least {required} required")]
    InsufficientProxies { validated: usize, required: usize },
    /// The initial counter sample failed, so there is nothing to boost against.
    #[error(transparent)]
    Metric(#[from] MetricUnavailable),
}

//! Candidate acquisition from external proxy feeds.

use async_trait::async_trait;
use chrono::{Days, Utc};
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::SourceUnavailable;
use crate::proxy::Candidate;

/// A provider of raw relay candidates.
///
/// Implementations fetch one snapshot per call and de-duplicate by
/// `(host, port)`. They do not retry internally; the caller decides whether
/// a failed or empty fetch is fatal.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetch the current candidate list.
    async fn fetch(&self) -> Result<Vec<Candidate>, SourceUnavailable>;
}

/// Date-keyed JSON archive feed.
///
/// Walks back from yesterday, requesting `{base}/{YYYY-MM-DD}` until a day
/// yields candidates or the lookback window is spent. A day that is
/// unreachable or malformed counts as a miss, not a hard failure.
pub struct ArchiveFeedSource {
    base_url: String,
    lookback_days: u64,
    fetch_timeout: Duration,
}

impl ArchiveFeedSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            lookback_days: 7,
            fetch_timeout: Duration::from_secs(10),
        }
    }

    /// Set how many days back the archive walk may reach.
    pub fn lookback_days(mut self, days: u64) -> Self {
        self.lookback_days = days;
        self
    }

    /// Set the deadline for one archive request.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

#[async_trait]
impl ProxySource for ArchiveFeedSource {
    async fn fetch(&self) -> Result<Vec<Candidate>, SourceUnavailable> {
        let client = Client::builder().timeout(self.fetch_timeout).build()?;
        let mut day = Utc::now().date_naive();

        for _ in 0..self.lookback_days {
            day = day - Days::new(1);
            let url = format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                day.format("%Y-%m-%d")
            );
            info!("fetching proxy archive {}", url);

            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.json::<Value>().await {
                    Ok(body) => {
                        let found = parse_archive(&body);
                        if !found.is_empty() {
                            let found = dedup(found);
                            info!("archive {} yielded {} candidates", day, found.len());
                            return Ok(found);
                        }
                        warn!("archive {} listed no candidates", day);
                    }
                    Err(err) => warn!("archive {} body malformed: {}", day, err),
                },
                Ok(resp) => warn!("archive {} answered {}", day, resp.status()),
                Err(err) => warn!("archive {} unreachable: {}", day, err),
            }
        }

        Err(SourceUnavailable(format!(
            "no archive day within the last {} yielded candidates",
            self.lookback_days
        )))
    }
}

/// Extract candidates from an archive body: `data.proxyList` holding either
/// an array of `host:port` strings or an object whose values are such strings.
pub(crate) fn parse_archive(body: &Value) -> Vec<Candidate> {
    match &body["data"]["proxyList"] {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(Candidate::parse)
            .collect(),
        Value::Object(map) => map
            .values()
            .filter_map(Value::as_str)
            .filter_map(Candidate::parse)
            .collect(),
        _ => Vec::new(),
    }
}

/// Plain `host:port` line list, fetched from an URL or read from a file.
pub struct PlainListSource {
    location: String,
    fetch_timeout: Duration,
}

impl PlainListSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            fetch_timeout: Duration::from_secs(10),
        }
    }

    /// Set the deadline for the list request.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

#[async_trait]
impl ProxySource for PlainListSource {
    async fn fetch(&self) -> Result<Vec<Candidate>, SourceUnavailable> {
        let content = if self.location.starts_with("http") {
            let client = Client::builder().timeout(self.fetch_timeout).build()?;
            client
                .get(&self.location)
                .send()
                .await?
                .error_for_status()
                .map_err(SourceUnavailable::from)?
                .text()
                .await?
        } else {
            tokio::fs::read_to_string(&self.location).await?
        };

        let candidates = dedup(parse_proxy_list(&content));
        info!("{} listed {} candidates", self.location, candidates.len());
        Ok(candidates)
    }
}

/// Parse text content into candidates, one `host:port` per line. Comment
/// lines and anything unparseable are skipped.
pub(crate) fn parse_proxy_list(content: &str) -> Vec<Candidate> {
    content.lines().filter_map(Candidate::parse).collect()
}

/// Fixed candidate list, for embedding and tests.
pub struct StaticSource {
    candidates: Vec<Candidate>,
}

impl StaticSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl ProxySource for StaticSource {
    async fn fetch(&self) -> Result<Vec<Candidate>, SourceUnavailable> {
        Ok(dedup(self.candidates.clone()))
    }
}

/// De-duplicate by `(host, port)`, preserving first-seen order.
fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_list_skips_noise() {
        let content = "203.0.113.1:8080\n# comment\n\nsocks5://203.0.113.2:1080\nnot a proxy\n";
        let candidates = parse_proxy_list(content);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].key(), "203.0.113.1:8080");
        assert_eq!(candidates[1].key(), "203.0.113.2:1080");
    }

    #[test]
    fn parse_archive_array_shape() {
        let body = json!({
            "data": { "proxyList": ["203.0.113.1:3128", "203.0.113.2:80", 42] }
        });
        let candidates = parse_archive(&body);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn parse_archive_object_shape() {
        let body = json!({
            "data": { "proxyList": { "a": "203.0.113.1:3128", "b": "203.0.113.2:80" } }
        });
        assert_eq!(parse_archive(&body).len(), 2);
    }

    #[test]
    fn parse_archive_unexpected_shape() {
        let body = json!({ "data": { "proxyList": "oops" } });
        assert!(parse_archive(&body).is_empty());
        assert!(parse_archive(&json!({})).is_empty());
    }

    #[test]
    fn dedup_keeps_first_seen() {
        let candidates = vec![
            Candidate::new("203.0.113.1", 80),
            Candidate::new("203.0.113.2", 80),
            Candidate::new("203.0.113.1", 80),
        ];
        let unique = dedup(candidates);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].host, "203.0.113.1");
        assert_eq!(unique[1].host, "203.0.113.2");
    }

    #[tokio::test]
    async fn static_source_dedups() {
        let source = StaticSource::new(vec![
            Candidate::new("203.0.113.1", 80),
            Candidate::new("203.0.113.1", 80),
        ]);
        let fetched = source.fetch().await.unwrap();
        assert_eq!(fetched.len(), 1);
    }
}

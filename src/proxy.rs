//! Relay endpoint representation: raw candidates and validated pool members.

use std::fmt;
use std::time::{Duration, Instant};

/// Scheme used to connect through a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Socks5,
}

impl Scheme {
    fn prefix(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Socks5 => "socks5",
        }
    }
}

/// An unvalidated relay endpoint descriptor.
///
/// Created by a source, consumed by the validator, and discarded after
/// validation regardless of outcome. Two candidates are the same relay
/// when they share `(host, port)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
    pub scheme: Scheme,
}

impl Candidate {
    /// Create a plain HTTP relay candidate.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            scheme: Scheme::Http,
        }
    }

    /// Create a candidate with an explicit scheme.
    pub fn with_scheme(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }

    /// Parse a feed entry. Accepts `host:port` (assumed HTTP) and
    /// `http://host:port` / `socks5://host:port` forms; anything else is
    /// rejected with `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            return None;
        }
        let (scheme, rest) = match raw.split_once("://") {
            Some(("http", rest)) => (Scheme::Http, rest),
            Some(("socks5", rest)) => (Scheme::Socks5, rest),
            Some(_) => return None,
            None => (Scheme::Http, raw),
        };
        let (host, port) = rest.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        Some(Self {
            host: host.to_string(),
            port,
            scheme,
        })
    }

    /// De-duplication key: `host:port`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Proxy URL in the form reqwest understands.
    pub fn proxy_url(&self) -> String {
        format!("{}://{}:{}", self.scheme.prefix(), self.host, self.port)
    }

    /// Convert the candidate to a reqwest::Proxy.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        reqwest::Proxy::all(self.proxy_url())
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.proxy_url())
    }
}

/// A candidate that passed a reachability probe, owned by the pool.
#[derive(Debug, Clone)]
pub struct ValidatedEndpoint {
    pub candidate: Candidate,
    /// Probe round-trip time measured at validation.
    pub latency: Duration,
    /// When the successful probe ran. No freshness guarantee beyond that instant.
    pub validated_at: Instant,
    /// Successful requests made through this endpoint.
    pub success_count: usize,
    /// Failed requests made through this endpoint.
    pub failure_count: usize,
    /// Consecutive failures since the last success.
    pub strikes: u32,
}

impl ValidatedEndpoint {
    /// Annotate a candidate that just answered a probe.
    pub fn new(candidate: Candidate, latency: Duration) -> Self {
        Self {
            candidate,
            latency,
            validated_at: Instant::now(),
            success_count: 0,
            failure_count: 0,
            strikes: 0,
        }
    }

    /// De-duplication key: `host:port`.
    pub fn key(&self) -> String {
        self.candidate.key()
    }

    /// Calculate the success rate of this endpoint.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            return 0.0;
        }
        self.success_count as f64 / total as f64
    }
}

impl fmt::Display for ValidatedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_host_port() {
        let c = Candidate::parse("203.0.113.7:8080").unwrap();
        assert_eq!(c.host, "203.0.113.7");
        assert_eq!(c.port, 8080);
        assert_eq!(c.scheme, Scheme::Http);
        assert_eq!(c.proxy_url(), "http://203.0.113.7:8080");
    }

    #[test]
    fn parse_scheme_prefixed() {
        let c = Candidate::parse("socks5://203.0.113.7:1080").unwrap();
        assert_eq!(c.scheme, Scheme::Socks5);
        assert_eq!(c.key(), "203.0.113.7:1080");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Candidate::parse("").is_none());
        assert!(Candidate::parse("# comment").is_none());
        assert!(Candidate::parse("no-port-here").is_none());
        assert!(Candidate::parse("host:notaport").is_none());
        assert!(Candidate::parse("ftp://host:21").is_none());
        assert!(Candidate::parse(":8080").is_none());
    }

    #[test]
    fn success_rate_counts() {
        let mut e = ValidatedEndpoint::new(Candidate::new("h", 1), Duration::from_millis(5));
        assert_eq!(e.success_rate(), 0.0);
        e.success_count = 3;
        e.failure_count = 1;
        assert!((e.success_rate() - 0.75).abs() < f64::EPSILON);
    }
}

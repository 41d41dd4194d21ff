//! Abstraction over the remote counter service.

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::error::MetricUnavailable;

/// A remote service that exposes a countable action and an authoritative
/// counter. The dispatcher drives `click` through proxied clients; the
/// metric tracker reads `sample` through a direct one.
#[async_trait]
pub trait ClickTarget: Send + Sync {
    /// Issue one countable action through the supplied client.
    async fn click(&self, client: &Client) -> Result<(), reqwest::Error>;

    /// Read the current authoritative counter value.
    async fn sample(&self, client: &Client) -> Result<u64, MetricUnavailable>;
}

/// Browser user agents rotated across requests so attempts do not share an
/// obvious fingerprint on top of the rotating relays.
static USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0",
];

fn random_user_agent() -> &'static str {
    let idx = rand::rng().random_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Generic HTTP implementation: POST a click, GET a JSON counter.
///
/// The counter response is read at a dotted field path, e.g. `data.stat.view`
/// for `{"data":{"stat":{"view":1234}}}`.
pub struct HttpTarget {
    click_url: Url,
    counter_url: Url,
    counter_field: String,
    form: Vec<(String, String)>,
}

impl HttpTarget {
    /// Validate the URLs up front and build a target.
    pub fn new(
        click_url: &str,
        counter_url: &str,
        counter_field: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            click_url: Url::parse(click_url)?,
            counter_url: Url::parse(counter_url)?,
            counter_field: counter_field.into(),
            form: Vec::new(),
        })
    }

    /// Form fields sent with every click request.
    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = fields;
        self
    }
}

#[async_trait]
impl ClickTarget for HttpTarget {
    async fn click(&self, client: &Client) -> Result<(), reqwest::Error> {
        client
            .post(self.click_url.clone())
            .header(USER_AGENT, random_user_agent())
            .form(&self.form)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn sample(&self, client: &Client) -> Result<u64, MetricUnavailable> {
        let body: Value = client
            .get(self.counter_url.clone())
            .header(USER_AGENT, random_user_agent())
            .send()
            .await?
            .error_for_status()
            .map_err(MetricUnavailable::Transport)?
            .json()
            .await?;

        read_field(&body, &self.counter_field).ok_or_else(|| {
            MetricUnavailable::Malformed(format!(
                "no unsigned integer at `{}`",
                self.counter_field
            ))
        })
    }
}

/// Walk a dotted path into a JSON body and read an unsigned integer.
fn read_field<'a>(body: &'a Value, path: &str) -> Option<u64> {
    let mut node = body;
    for part in path.split('.') {
        node = node.get(part)?;
    }
    node.as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_field_walks_nested_path() {
        let body = json!({ "data": { "stat": { "view": 1234 } } });
        assert_eq!(read_field(&body, "data.stat.view"), Some(1234));
        assert_eq!(read_field(&body, "data.stat.missing"), None);
        assert_eq!(read_field(&body, "data"), None);
    }

    #[test]
    fn read_field_top_level() {
        assert_eq!(read_field(&json!({ "count": 7 }), "count"), Some(7));
    }

    #[test]
    fn new_rejects_malformed_urls() {
        assert!(HttpTarget::new("not a url", "http://a/b", "count").is_err());
        assert!(HttpTarget::new("http://a/b", "::", "count").is_err());
    }

    #[test]
    fn user_agent_rotation_stays_in_list() {
        for _ in 0..50 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }
}

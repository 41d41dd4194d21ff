//! Integration tests for the validator using wiremock relays.
//!
//! The mock server stands in for a relay: a proxied plain-HTTP request
//! arrives at the relay socket in absolute form, so a catch-all mock makes
//! the "relay" answer any probe sent through it.

use std::time::Duration;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

use viewboost::{BoostConfig, Candidate, Progress, Validator};

fn config_for(timeout_ms: u64, progress_every: usize) -> BoostConfig {
    BoostConfig::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .concurrency(8)
        .progress_every(progress_every)
        .probe_url("http://probe.invalid/ip")
        .build()
}

async fn relay() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn candidate_for(server: &MockServer) -> Candidate {
    let addr = server.address();
    Candidate::new(addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn keeps_reachable_candidates_and_drops_dead_ones() {
    let relay = relay().await;
    let reachable = candidate_for(&relay);
    let dead = Candidate::new("127.0.0.1", 1);

    let validator = Validator::new(&config_for(2000, 10));
    let validated = validator
        .validate(vec![reachable.clone(), dead], None)
        .await;

    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].key(), reachable.key());
}

#[tokio::test]
async fn drops_candidates_that_exceed_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let validator = Validator::new(&config_for(150, 10));
    let validated = validator.validate(vec![candidate_for(&server)], None).await;

    assert!(validated.is_empty());
}

#[tokio::test]
async fn emits_progress_at_the_configured_granularity() {
    let relay = relay().await;
    let mut candidates = vec![candidate_for(&relay)];
    // distinct dead ports keep the keys unique
    for port in 1..5 {
        candidates.push(Candidate::new("127.0.0.1", port));
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let validator = Validator::new(&config_for(1000, 2));
    let validated = validator.validate(candidates, Some(&tx)).await;
    drop(tx);

    assert_eq!(validated.len(), 1);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(!events.is_empty());
    // completion is always reported, even off-granularity
    assert!(events.contains(&Progress::Validating {
        processed: 5,
        total: 5
    }));
    // processed counts never regress
    let mut last = 0;
    for event in events {
        let Progress::Validating { processed, total } = event else {
            panic!("unexpected event during validation");
        };
        assert_eq!(total, 5);
        assert!(processed >= last);
        last = processed;
    }
}

#[tokio::test]
async fn empty_candidate_list_is_a_noop() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let validator = Validator::new(&config_for(100, 1));
    let validated = validator.validate(Vec::new(), Some(&tx)).await;
    drop(tx);

    assert!(validated.is_empty());
    assert!(rx.try_recv().is_err());
}

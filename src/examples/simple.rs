//! Simple example of driving a boost run.

use std::sync::Arc;
use std::time::Duration;

use viewboost::{ArchiveFeedSource, BoostConfig, Booster, HttpTarget, Progress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = BoostConfig::builder()
        .timeout(Duration::from_secs(3))
        .concurrency(75)
        .round_time(Duration::from_secs(305))
        .min_proxies(100)
        .probe_url("http://httpbin.org/ip")
        .max_ticks_per_second(5.0)
        .build();

    // date-keyed archive of recently seen relays
    let source = Arc::new(ArchiveFeedSource::new(
        "https://proxy-archive.example.net/v1/archive",
    ));

    let target = Arc::new(
        HttpTarget::new(
            "http://counter.example.net/click",
            "http://counter.example.net/state",
            "data.count",
        )?
        .form(vec![("part".to_string(), "1".to_string())]),
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                Progress::Validating { processed, total } => {
                    println!("validating {}/{}", processed, total);
                }
                Progress::Dispatching { attempts, hits, delta } => {
                    println!("{} attempts, {} hits, counter +{}", attempts, hits, delta);
                }
                Progress::Sampled { value, delta } => {
                    println!("counter at {} (+{})", value, delta);
                }
                Progress::LowYield { round_successes, delta } => {
                    println!(
                        "warning: {} hits this round but counter only +{} overall",
                        round_successes, delta
                    );
                }
                Progress::Replenishing { pool_size } => {
                    println!("pool down to {}, replenishing...", pool_size);
                }
                Progress::Replenished { added, pool_size } => {
                    println!("replenished: {} added, {} total", added, pool_size);
                }
            }
        }
    });

    let booster = Booster::new(config, source, target).with_progress(tx);
    let summary = booster.run(10_000).await?;

    println!("==================================================");
    println!("FINAL STATISTICS");
    println!("==================================================");
    println!("- Outcome: {:?}", summary.outcome);
    println!("- Initial count: {}", summary.initial_count);
    println!("- Final count: {}", summary.final_count);
    println!("- Total increase: {}", summary.increase());
    println!("- Attempts: {}", summary.attempts);
    println!("- Successful hits: {}", summary.successes);
    println!("- Success rate: {:.2}%", summary.success_rate());
    println!("- Total duration: {:?}", summary.elapsed);
    println!("- Active endpoints: {}", summary.active_endpoints);

    Ok(())
}

//! Market polling commands: `check`, `rate-limit` and `watch`.

use std::time::Duration;

use anyhow::Context;
use pulse_core::AppConfig;
use pulse_poller::{BackoffPoller, MarketClient, PollResult, PollerStatus};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};

use crate::print_json_line;

/// One periodic line printed by `watch`.
#[derive(Debug, Serialize)]
struct WatchReport {
    status: PollerStatus,
    results: Vec<PollResult>,
}

fn build_poller(config: &AppConfig) -> anyhow::Result<BackoffPoller<MarketClient>> {
    let client = MarketClient::from_config(config).context("failed to build market client")?;
    Ok(BackoffPoller::new(client, config.poller))
}

/// Runs a single rate-gated round and prints one line per refreshed market.
///
/// Markets that fail or do not exist are logged, not treated as errors.
pub(crate) async fn run_check(config: &AppConfig, markets: &[String]) -> anyhow::Result<()> {
    let poller = build_poller(config)?;
    let results = poller.check_batch(markets).await;

    for result in &results {
        print_json_line(result);
    }

    if poller.status().backing_off {
        tracing::warn!(
            requested = markets.len(),
            "rate budget below low-water mark; no markets were checked"
        );
    } else if results.len() < markets.len() {
        tracing::warn!(
            requested = markets.len(),
            refreshed = results.len(),
            "some markets returned no result"
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the client cannot be built or the probe fails.
pub(crate) async fn run_rate_limit(config: &AppConfig) -> anyhow::Result<()> {
    let poller = build_poller(config)?;
    let state = poller
        .check_rate_limit()
        .await
        .ok_or_else(|| anyhow::anyhow!("rate-limit probe failed; see logs for details"))?;
    print_json_line(&state);
    Ok(())
}

/// Polls `markets` in the background and prints a [`WatchReport`] every
/// `report_every_secs` until Ctrl-C.
pub(crate) async fn run_watch(
    config: &AppConfig,
    markets: Vec<String>,
    report_every_secs: Option<u64>,
) -> anyhow::Result<()> {
    let poller = build_poller(config)?;
    let every = report_every_secs.map_or(config.poller.poll_interval, Duration::from_secs);

    poller.start_polling(markets);

    let mut report = tokio::time::interval_at(Instant::now() + every, every);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("failed to listen for ctrl-c")?;
                tracing::info!("received ctrl-c, stopping");
                break;
            }
            _ = report.tick() => {
                print_json_line(&WatchReport {
                    status: poller.status(),
                    results: poller.results(),
                });
            }
        }
    }

    poller.stop_polling();
    print_json_line(&WatchReport {
        status: poller.status(),
        results: poller.results(),
    });
    Ok(())
}

//! Background poller over a mutable set of markets.
//!
//! Each round first probes the remote rate budget; when the remaining count
//! is below the low-water mark the round makes no per-market calls at all.
//! Otherwise markets are checked in windows of `concurrency` requests, each
//! window finishing before the next one starts.
//!
//! Failures never reach the caller. A failed probe leaves the previous
//! [`RateLimitState`] in force, a failed or missing market keeps whatever
//! result was cached for it, and the schedule keeps running.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use pulse_core::PollerPolicy;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::MarketApi;
use crate::types::{PollResult, PollerStatus, RateLimitState};

/// Shortest period the session ticker accepts; `interval_at` panics on zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polls market status on a fixed period, gated by the remote rate budget.
///
/// Results are served from an in-memory cache by [`get_result`](Self::get_result),
/// which never touches the network. Dropping the poller stops polling.
pub struct BackoffPoller<A> {
    shared: Arc<Shared<A>>,
    session: Mutex<Option<PollSession>>,
}

/// State reachable from both the poller handle and its session task.
struct Shared<A> {
    api: A,
    policy: PollerPolicy,
    results: RwLock<HashMap<String, PollResult>>,
    rate_limit: RwLock<Option<RateLimitState>>,
}

/// One running schedule. Replaced wholesale by each `start_polling`.
struct PollSession {
    targets: Vec<String>,
    shutdown: watch::Sender<bool>,
}

impl PollSession {
    /// Signals the session task to exit at its next select point.
    ///
    /// An in-flight round is not interrupted; it finishes and writes its
    /// results to the cache. After a restart that round can overlap the new
    /// session's immediate round, so up to `2 * concurrency` market checks
    /// may be pending for a moment.
    fn cancel(self) {
        let _ = self.shutdown.send(true);
    }
}

impl<A> BackoffPoller<A>
where
    A: MarketApi + 'static,
{
    #[must_use]
    pub fn new(api: A, policy: PollerPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                policy,
                results: RwLock::new(HashMap::new()),
                rate_limit: RwLock::new(None),
            }),
            session: Mutex::new(None),
        }
    }

    /// Probes the remote rate budget and records it.
    ///
    /// Returns `None` when the probe fails; the previously recorded state is
    /// left untouched and keeps gating rounds.
    pub async fn check_rate_limit(&self) -> Option<RateLimitState> {
        self.shared.check_rate_limit().await
    }

    /// Checks one market and caches the result if the market exists.
    ///
    /// Returns `None` on any error or when the remote reports no such
    /// market. A `None` never evicts a cached result.
    pub async fn check_one(&self, market_id: &str) -> Option<PollResult> {
        self.shared.check_one(market_id).await
    }

    /// Runs one rate-gated round over `market_ids`.
    ///
    /// Returns the markets that were checked successfully. An empty input
    /// makes no network calls; a low rate budget makes exactly one (the probe).
    pub async fn check_batch(&self, market_ids: &[String]) -> Vec<PollResult> {
        self.shared.check_batch(market_ids).await
    }

    /// Replaces the watched markets and restarts the schedule.
    ///
    /// Any running session is cancelled first. With a non-empty list a round
    /// runs immediately and then every `poll_interval`. An empty list clears
    /// the result cache and leaves the poller idle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_polling(&self, market_ids: Vec<String>) {
        let mut session = lock(&self.session);
        if let Some(previous) = session.take() {
            previous.cancel();
        }

        if market_ids.is_empty() {
            write(&self.shared.results).clear();
            tracing::info!("no markets to watch; poller idle");
            return;
        }

        tracing::info!(
            targets = market_ids.len(),
            interval_secs = self.shared.policy.poll_interval.as_secs(),
            "starting market polling"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run_session(
            Arc::clone(&self.shared),
            market_ids.clone(),
            shutdown_rx,
        ));
        *session = Some(PollSession {
            targets: market_ids,
            shutdown: shutdown_tx,
        });
    }

    /// Cancels the schedule. Calling it while idle does nothing.
    pub fn stop_polling(&self) {
        if let Some(session) = lock(&self.session).take() {
            tracing::info!(targets = session.targets.len(), "stopping market polling");
            session.cancel();
        }
    }
}

impl<A> BackoffPoller<A> {
    /// Cached result for `market_id`. Never performs network I/O.
    #[must_use]
    pub fn get_result(&self, market_id: &str) -> Option<PollResult> {
        read(&self.shared.results).get(market_id).cloned()
    }

    /// All cached results, ordered by market id.
    #[must_use]
    pub fn results(&self) -> Vec<PollResult> {
        let mut all: Vec<PollResult> = read(&self.shared.results).values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        lock(&self.session).is_some()
    }

    #[must_use]
    pub fn active_targets(&self) -> Vec<String> {
        lock(&self.session)
            .as_ref()
            .map(|s| s.targets.clone())
            .unwrap_or_default()
    }

    /// Last successfully probed rate budget, if any.
    #[must_use]
    pub fn rate_limit_state(&self) -> Option<RateLimitState> {
        read(&self.shared.rate_limit).clone()
    }

    #[must_use]
    pub fn status(&self) -> PollerStatus {
        PollerStatus {
            polling: self.is_polling(),
            backing_off: self.shared.backing_off(),
            targets: self.active_targets().len(),
            cached: read(&self.shared.results).len(),
        }
    }
}

impl<A> Drop for BackoffPoller<A> {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = session.take() {
            session.cancel();
        }
    }
}

impl<A> Shared<A> {
    /// Whether the last recorded rate budget says to back off.
    fn backing_off(&self) -> bool {
        read(&self.rate_limit)
            .as_ref()
            .is_some_and(|state| state.should_backoff)
    }

    /// Caches `result` only if it is strictly newer than the cached one.
    fn store_result(&self, result: &PollResult) {
        let mut results = write(&self.results);
        match results.get(&result.id) {
            Some(existing) if existing.last_checked >= result.last_checked => {}
            _ => {
                results.insert(result.id.clone(), result.clone());
            }
        }
    }
}

impl<A: MarketApi> Shared<A> {
    async fn check_rate_limit(&self) -> Option<RateLimitState> {
        match self.api.fetch_rate_limit().await {
            Ok(info) => {
                let state = info.into_state(self.policy.low_water_mark);
                if state.should_backoff {
                    tracing::info!(
                        remaining = state.remaining,
                        limit = state.limit,
                        reset_at = %state.reset_at,
                        "rate budget below low-water mark; backing off"
                    );
                }
                *write(&self.rate_limit) = Some(state.clone());
                Some(state)
            }
            Err(e) => {
                tracing::warn!(error = %e, "rate-limit probe failed; keeping last known budget");
                None
            }
        }
    }

    async fn check_one(&self, market_id: &str) -> Option<PollResult> {
        match self.api.fetch_market_status(market_id).await {
            Ok(Some(status)) if status.exists => {
                let result = PollResult {
                    id: market_id.to_owned(),
                    exists: true,
                    volume: status.volume,
                    liquidity: status.liquidity,
                    last_checked: Utc::now(),
                };
                self.store_result(&result);
                Some(result)
            }
            Ok(_) => {
                tracing::debug!(market_id, "market not found; keeping cached result");
                None
            }
            Err(e) => {
                tracing::warn!(market_id, error = %e, "market status check failed");
                None
            }
        }
    }

    async fn check_batch(&self, market_ids: &[String]) -> Vec<PollResult> {
        if market_ids.is_empty() {
            return Vec::new();
        }

        let gate = self
            .check_rate_limit()
            .await
            .or_else(|| read(&self.rate_limit).clone());
        if gate.is_some_and(|state| state.should_backoff) {
            tracing::info!(
                targets = market_ids.len(),
                "skipping round; rate budget too low"
            );
            return Vec::new();
        }

        let window = self.policy.concurrency.max(1);
        let mut results = Vec::with_capacity(market_ids.len());
        for chunk in market_ids.chunks(window) {
            let checks = chunk.iter().map(|id| self.check_one(id));
            results.extend(join_all(checks).await.into_iter().flatten());
        }

        tracing::debug!(
            requested = market_ids.len(),
            refreshed = results.len(),
            "batch round complete"
        );
        results
    }
}

/// Session task: one immediate round, then one per tick until cancelled.
///
/// A tick is skipped without probing while the last recorded budget says to
/// back off. The flag is only refreshed by an explicit probe, so a skipped
/// tick keeps trusting the stale value.
async fn run_session<A: MarketApi>(
    shared: Arc<Shared<A>>,
    targets: Vec<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    shared.check_batch(&targets).await;

    let period = shared.policy.poll_interval.max(MIN_POLL_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    // A slow round delays the next tick instead of bunching ticks up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if shared.backing_off() {
                    tracing::info!("skipping scheduled round; last probe asked to back off");
                    continue;
                }
                shared.check_batch(&targets).await;
            }
        }
    }

    tracing::debug!(targets = targets.len(), "polling session ended");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(rw: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(rw: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;

//! Polling Data Fetcher
//!
//! Keeps a consumer supplied with fresh records from a [`RemoteSource`]:
//! fetches immediately, re-fetches on a fixed interval, and retries
//! rate-limited requests with a fixed delay.

use super::error::FetchError;
use super::retry::{RetryDecision, RetryPolicy, RetryState};
use super::RemoteSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a consumer sees of a poller
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult<T> {
    /// Records from the latest successful fetch, in server order
    pub items: Vec<T>,
    /// True until the first fetch resolves
    pub loading: bool,
    /// Error from the latest fetch, if it failed
    pub error: Option<FetchError>,
    /// When `items` was last replaced
    pub last_updated: Option<DateTime<Utc>>,
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            error: None,
            last_updated: None,
        }
    }
}

impl<T> QueryResult<T> {
    /// User-facing text for the current error
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(FetchError::user_message)
    }

    /// Whether a first result (data or error) has been produced
    pub fn is_resolved(&self) -> bool {
        !self.loading
    }
}

/// Configuration for a poller
///
/// Fixed at construction.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between two fetch cycles
    pub poll_interval_ms: u64,
    /// Consecutive rate-limited attempts before giving up
    pub max_retries: u32,
    /// Delay before retrying a rate-limited attempt
    pub retry_delay_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 2_000,
        }
    }
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Result of one logical fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Items replaced with this many records
    Updated(usize),
    /// Error surfaced, previous items kept
    Failed,
    /// Another fetch was already in flight
    Skipped,
    /// The poller was stopped; nothing applied
    Cancelled,
}

/// Polls one remote source
pub struct Poller<S: RemoteSource> {
    id: String,
    source: Arc<S>,
    config: PollerConfig,
    policy: RetryPolicy,
    state: watch::Sender<QueryResult<S::Item>>,
    /// Held for the whole retry chain; a busy lock means a fetch is in flight
    in_flight: Mutex<RetryState>,
    cancel: CancellationToken,
}

impl<S: RemoteSource> Poller<S> {
    /// Create a new poller over `source`
    pub fn new(source: S, config: PollerConfig) -> Self {
        Self::with_shared(Arc::new(source), config)
    }

    /// Create a poller over a source shared with other consumers
    pub fn with_shared(source: Arc<S>, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(QueryResult::default());
        let policy = config.retry_policy();

        Self {
            id: Uuid::new_v4().to_string(),
            source,
            config,
            policy,
            state,
            in_flight: Mutex::new(RetryState::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Current state
    pub fn snapshot(&self) -> QueryResult<S::Item> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<QueryResult<S::Item>> {
        self.state.subscribe()
    }

    /// Start polling in the background
    ///
    /// Fetches immediately, then every `poll_interval` after the previous
    /// fetch finished. Must be called from within a tokio runtime.
    pub fn start(self) -> PollHandle<S::Item> {
        let poller = Arc::new(self);
        let state = poller.subscribe();
        let cancel = poller.cancel.clone();
        let (refresh_tx, refresh_rx) = mpsc::channel(1);

        tracing::info!(
            poller = %poller.id,
            source = %poller.source.name(),
            interval_ms = poller.config.poll_interval_ms,
            "Starting poller"
        );

        let task = tokio::spawn(poller.run(refresh_rx));

        PollHandle {
            state,
            refresh_tx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(self: Arc<Self>, mut refresh_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
                Some(()) = refresh_rx.recv() => {}
            }

            if self.fetch_once().await == FetchOutcome::Cancelled {
                break;
            }

            // Ticks and refresh requests that arrived mid-fetch are dropped
            ticker.reset();
            while refresh_rx.try_recv().is_ok() {}
        }

        tracing::info!(poller = %self.id, source = %self.source.name(), "Poller stopped");
    }

    /// Run one logical fetch, including its rate-limit retry chain
    pub async fn fetch_once(&self) -> FetchOutcome {
        let Ok(mut retry) = self.in_flight.try_lock() else {
            tracing::debug!(poller = %self.id, "Fetch already in flight, skipping");
            return FetchOutcome::Skipped;
        };

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return FetchOutcome::Cancelled,
                result = self.source.fetch() => result,
            };

            match result {
                Ok(items) => {
                    retry.reset();
                    let count = items.len();
                    let applied = self.apply(|state| {
                        state.items = items;
                        state.error = None;
                        state.loading = false;
                        state.last_updated = Some(Utc::now());
                    });
                    if !applied {
                        return FetchOutcome::Cancelled;
                    }

                    tracing::debug!(
                        poller = %self.id,
                        source = %self.source.name(),
                        items = count,
                        "Fetch succeeded"
                    );
                    return FetchOutcome::Updated(count);
                }
                Err(e) if e.is_rate_limit() => match retry.record_rate_limit(&self.policy) {
                    RetryDecision::Retry { attempt, delay } => {
                        tracing::warn!(
                            poller = %self.id,
                            source = %self.source.name(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Rate limited, retrying"
                        );
                        self.apply(|state| state.error = Some(FetchError::RateLimited { attempt }));

                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => return FetchOutcome::Cancelled,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    RetryDecision::GiveUp { attempts } => {
                        retry.reset();
                        tracing::error!(
                            poller = %self.id,
                            source = %self.source.name(),
                            attempts,
                            "Rate limited on every attempt, giving up until next poll"
                        );
                        return self.fail(FetchError::Exhausted { attempts });
                    }
                },
                Err(e) => {
                    retry.reset();
                    tracing::error!(
                        poller = %self.id,
                        source = %self.source.name(),
                        error = %e,
                        "Fetch failed"
                    );
                    return self.fail(e);
                }
            }
        }
    }

    /// Surface an error, keeping whatever items are already shown
    fn fail(&self, error: FetchError) -> FetchOutcome {
        let applied = self.apply(|state| {
            state.error = Some(error);
            state.loading = false;
        });

        if applied {
            FetchOutcome::Failed
        } else {
            FetchOutcome::Cancelled
        }
    }

    /// Modify shared state unless the poller has been stopped
    fn apply(&self, update: impl FnOnce(&mut QueryResult<S::Item>)) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if self.cancel.is_cancelled() {
                return false;
            }
            update(state);
            applied = true;
            true
        });
        applied
    }
}

/// Handle to a running poller
///
/// Dropping the handle stops the poller.
pub struct PollHandle<T> {
    state: watch::Receiver<QueryResult<T>>,
    refresh_tx: mpsc::Sender<()>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T: Clone> PollHandle<T> {
    /// Current state
    pub fn snapshot(&self) -> QueryResult<T> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<QueryResult<T>> {
        self.state.clone()
    }

    /// Wait for the next state change
    ///
    /// Returns `false` once the poller has stopped.
    pub async fn changed(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.state.changed().await.is_ok()
    }

    /// Ask for an immediate fetch
    ///
    /// Returns `false` if a request is already pending or the poller has
    /// stopped.
    pub fn refresh(&self) -> bool {
        !self.cancel.is_cancelled() && self.refresh_tx.try_send(()).is_ok()
    }

    /// Cancel polling, pending retries and the in-flight request
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop and wait for the polling task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Poller task ended abnormally");
            }
        }
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedSource;

    fn config(poll_ms: u64, retries: u32, delay_ms: u64) -> PollerConfig {
        PollerConfig {
            poll_interval_ms: poll_ms,
            max_retries: retries,
            retry_delay_ms: delay_ms,
        }
    }

    #[test]
    fn test_default_state_is_loading() {
        let state: QueryResult<u32> = QueryResult::default();
        assert!(state.loading);
        assert!(state.items.is_empty());
        assert!(state.error.is_none());
        assert!(state.error_message().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_replaces_items() {
        let source = ScriptedSource::new(vec![Ok(vec![1, 2]), Ok(vec![3])]);
        let poller = Poller::new(source, config(60_000, 3, 100));

        assert_eq!(poller.fetch_once().await, FetchOutcome::Updated(2));
        assert_eq!(poller.fetch_once().await, FetchOutcome::Updated(1));

        let state = poller.snapshot();
        assert_eq!(state.items, vec![3]);
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert!(state.last_updated.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion() {
        let source = ScriptedSource::new(vec![
            Err(FetchError::RateLimited { attempt: 0 }),
            Err(FetchError::RateLimited { attempt: 0 }),
            Err(FetchError::RateLimited { attempt: 0 }),
            Ok(vec![9]),
        ]);
        let calls = source.calls();
        let handle = Poller::new(source, config(60_000, 3, 100)).start();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let state = handle.snapshot();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(state.error, Some(FetchError::Exhausted { attempts: 3 }));
        assert_eq!(
            state.error_message(),
            Some("Too many requests. Please try again later.")
        );
        assert!(!state.loading);
        assert!(state.items.is_empty());

        // the next poll cycle starts with a fresh retry budget
        tokio::time::sleep(Duration::from_secs(60)).await;
        let state = handle.snapshot();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
        assert_eq!(state.items, vec![9]);
        assert!(state.error.is_none());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let source = ScriptedSource::new(vec![
            Err(FetchError::RateLimited { attempt: 0 }),
            Ok(vec![1]),
        ]);
        let poller = Poller::new(source, config(60_000, 3, 100));

        assert_eq!(poller.fetch_once().await, FetchOutcome::Updated(1));
        assert!(poller.snapshot().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generic_failure_does_not_retry() {
        let source = ScriptedSource::new(vec![
            Ok(vec![1, 2, 3]),
            Err(FetchError::Network("connection reset".into())),
        ]);
        let calls = source.calls();
        let poller = Poller::new(source, config(60_000, 3, 100));

        assert_eq!(poller.fetch_once().await, FetchOutcome::Updated(3));
        assert_eq!(poller.fetch_once().await, FetchOutcome::Failed);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);

        let state = poller.snapshot();
        assert!(matches!(state.error, Some(FetchError::Network(_))));
        // stale data stays on screen
        assert_eq!(state.items, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_result() {
        let source = ScriptedSource::new(vec![Ok(vec![1]), Ok(vec![2])])
            .with_delay(Duration::from_secs(10));
        let calls = source.calls();
        let handle = Poller::new(source, config(1_000, 3, 100)).start();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(handle.snapshot().items, vec![1]);

        // second fetch starts one interval after the first finished
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);

        let before = handle.snapshot();
        handle.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let after = handle.snapshot();
        assert_eq!(after.items, before.items);
        assert_eq!(after.error, before.error);
        assert_eq!(after.loading, before.loading);
        assert!(!handle.refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight() {
        let source = ScriptedSource::repeating(Ok(vec![1])).with_delay(Duration::from_secs(10));
        let calls = source.calls();
        let max_concurrent = source.max_concurrent();
        let handle = Poller::new(source, config(1_000, 3, 100)).start();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(handle.refresh());
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(max_concurrent.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) <= 4);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_once_skips_when_busy() {
        let source = ScriptedSource::repeating(Ok(vec![1])).with_delay(Duration::from_secs(10));
        let poller = Arc::new(Poller::new(source, config(60_000, 3, 100)));

        let background = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.fetch_once().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(poller.fetch_once().await, FetchOutcome::Skipped);
        assert_eq!(background.await.unwrap(), FetchOutcome::Updated(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_changed_reports_updates() {
        let source = ScriptedSource::repeating(Ok(vec![4]));
        let mut handle = Poller::new(source, config(60_000, 3, 100)).start();

        assert!(handle.changed().await);
        assert_eq!(handle.snapshot().items, vec![4]);

        handle.stop();
        assert!(!handle.changed().await);
    }
}
